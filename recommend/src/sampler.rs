use crate::selector::Candidate;
use chrono::{DateTime, Utc};
use newsrank_core::metrics::RunMetricsCollector;
use newsrank_core::model::RecommendationRecord;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::warn;

/// Draw one candidate with probability proportional to its weight.
/// Zero, negative and non-finite weights are never drawn.
pub fn sample_one<'a, R: Rng + ?Sized>(candidates: &'a [Candidate], rng: &mut R) -> Option<&'a Candidate> {
    let eligible: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.weight.is_finite() && c.weight > 0.0)
        .collect();
    if eligible.is_empty() {
        return None;
    }

    let index = WeightedIndex::new(eligible.iter().map(|c| c.weight)).ok()?;
    Some(eligible[index.sample(rng)])
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the username bytes. Fixed across platforms and toolchains.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// SplitMix64 finalizer.
fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^= x >> 31;
    x
}

/// Picks one article per user.
///
/// Each user draws from its own `ChaCha8Rng` seeded from the run seed and the
/// username, so users can be sampled in parallel and a fixed seed reproduces
/// the whole run.
pub struct WeightedSampler {
    seed: u64,
    metrics: Option<RunMetricsCollector>,
}

impl WeightedSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            metrics: None,
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn with_metrics(mut self, metrics: RunMetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn user_seed(&self, username: &str) -> u64 {
        mix64(self.seed ^ fnv1a(username.as_bytes()))
    }

    pub fn user_rng(&self, username: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.user_seed(username))
    }

    pub fn recommend(
        &self,
        candidates: Vec<Candidate>,
        generated_at: DateTime<Utc>,
    ) -> Vec<RecommendationRecord> {
        let mut by_user: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        for candidate in candidates {
            by_user
                .entry(candidate.username.clone())
                .or_default()
                .push(candidate);
        }
        let groups: Vec<(String, Vec<Candidate>)> = by_user.into_iter().collect();
        let stamp = generated_at.to_rfc3339();

        let records: Vec<RecommendationRecord> = groups
            .par_iter()
            .filter_map(|(username, candidates)| {
                let mut rng = self.user_rng(username);
                let Some(choice) = sample_one(candidates, &mut rng) else {
                    warn!(
                        "User {} has {} candidates but no positive weight; skipping",
                        username,
                        candidates.len()
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_degenerate_user();
                    }
                    return None;
                };

                let suffix = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
                Some(RecommendationRecord {
                    username: username.clone(),
                    article_uuid: choice.article_uuid.clone(),
                    rec_uuid: format!("{}{}", stamp, suffix),
                    article_date: choice.article_date,
                })
            })
            .collect();

        if let Some(metrics) = &self.metrics {
            metrics.record_recommendations(records.len());
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(user: &str, article: &str, weight: f64) -> Candidate {
        Candidate {
            username: user.to_string(),
            article_uuid: article.to_string(),
            article_date: Utc.with_ymd_and_hms(2026, 10, 15, 8, 0, 0).unwrap(),
            weight,
        }
    }

    #[test]
    fn test_sample_one_skips_ineligible_weights() {
        let candidates = vec![
            candidate("a", "zero", 0.0),
            candidate("a", "negative", -2.0),
            candidate("a", "nan", f64::NAN),
            candidate("a", "only", 0.01),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            assert_eq!(sample_one(&candidates, &mut rng).unwrap().article_uuid, "only");
        }
        assert!(sample_one(&candidates[..3], &mut rng).is_none());
        assert!(sample_one(&[], &mut rng).is_none());
    }

    #[test]
    fn test_user_rng_is_stable_per_seed() {
        let sampler = WeightedSampler::new(42);
        let a: u64 = sampler.user_rng("alice").gen();
        let b: u64 = sampler.user_rng("alice").gen();
        let c: u64 = sampler.user_rng("bob").gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_user_seed_is_pinned() {
        let sampler = WeightedSampler::new(42);
        assert_eq!(fnv1a(b"alice"), 0x508b_2abb_65a0_3907);
        assert_eq!(sampler.user_seed("alice"), 11750953498648435352);
        assert_eq!(sampler.user_seed("bob"), 10562233525537977220);
        assert_eq!(sampler.user_seed(""), 5639588619321834518);

        let expected: u64 = ChaCha8Rng::seed_from_u64(11750953498648435352).gen();
        let actual: u64 = sampler.user_rng("alice").gen();
        assert_eq!(actual, expected);
    }
}
