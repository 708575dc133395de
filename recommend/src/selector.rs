use chrono::{DateTime, Duration, Utc};
use newsrank_core::model::{ArticleRecord, RankingRecord, RecommendedArticleRecord};
use propagation::{LabelAssignment, WeightedGraph};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Per-user article affinities read off the converged article rows.
/// Every `(user label, article)` pair is emitted, with no recency filtering.
pub fn extract_affinities(graph: &WeightedGraph, assignment: &LabelAssignment) -> Vec<RankingRecord> {
    let mut out = Vec::new();
    for (node, row) in assignment.labeled_nodes() {
        let article = graph.node_id(node);
        if !article.is_article() {
            continue;
        }
        for &(label, weight) in row {
            let origin = graph.node_id(label);
            if origin.is_user() {
                out.push(RankingRecord {
                    username: origin.key.clone(),
                    article_uuid: article.key.clone(),
                    adsorption_weight: weight,
                });
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub username: String,
    pub article_uuid: String,
    pub article_date: DateTime<Utc>,
    pub weight: f64,
}

/// Restricts affinities to recent articles the user was not already given.
pub struct CandidateSelector {
    window: Duration,
}

impl CandidateSelector {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    pub fn select(
        &self,
        affinities: &[RankingRecord],
        articles: &[ArticleRecord],
        prior: &[RecommendedArticleRecord],
        now: DateTime<Utc>,
    ) -> Vec<Candidate> {
        let cutoff = self.cutoff(now);

        let recent: HashMap<&str, DateTime<Utc>> = articles
            .iter()
            .filter(|article| article.date >= cutoff)
            .map(|article| (article.article_uuid.as_str(), article.date))
            .collect();

        // Keyed on (user, article) only; the stored date is not compared.
        let already_recommended: HashSet<(&str, &str)> = prior
            .iter()
            .filter(|rec| rec.article_date >= cutoff)
            .map(|rec| (rec.username.as_str(), rec.article_uuid.as_str()))
            .collect();

        let candidates: Vec<Candidate> = affinities
            .iter()
            .filter_map(|affinity| {
                let date = recent.get(affinity.article_uuid.as_str())?;
                let key = (affinity.username.as_str(), affinity.article_uuid.as_str());
                if already_recommended.contains(&key) {
                    return None;
                }
                Some(Candidate {
                    username: affinity.username.clone(),
                    article_uuid: affinity.article_uuid.clone(),
                    article_date: *date,
                    weight: affinity.adsorption_weight,
                })
            })
            .collect();

        info!(
            "{} candidates from {} affinities ({} recent articles, {} excluded pairs)",
            candidates.len(),
            affinities.len(),
            recent.len(),
            already_recommended.len()
        );
        candidates
    }
}
