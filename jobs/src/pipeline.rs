use chrono::{DateTime, Utc};
use dashmap::DashMap;
use newsrank_core::config::{AppConfig, ConfigLoadError};
use newsrank_core::error::{ErrorCode, NewsrankError};
use newsrank_core::metrics::{RunMetricsCollector, RunMetricsSnapshot};
use newsrank_core::model::{RankingRecord, RecommendationRecord};
use propagation::{GraphBuilder, LabelPropagationEngine, PropagationError, PropagationState};
use recommend::{extract_affinities, CandidateSelector, WeightedSampler};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::loader::{EntityLoader, EntitySnapshot};
use storage::sink::PersistenceSink;
use storage::StorageError;
use thiserror::Error;
use tracing::info;

pub const RECOMMEND_JOB_KEY: &str = "recommend-articles";

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Propagation error: {0}")]
    Propagation(#[from] PropagationError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigLoadError),
    #[error("Job already running: {0}")]
    AlreadyRunning(String),
    #[error("Graph task failed: {0}")]
    Task(String),
}

impl NewsrankError for JobError {
    fn error_code(&self) -> ErrorCode {
        match self {
            JobError::Storage(e) => e.error_code(),
            JobError::Propagation(e) => e.error_code(),
            JobError::Config(e) => e.error_code(),
            JobError::AlreadyRunning(_) => ErrorCode::Aborted,
            JobError::Task(_) => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub state: PropagationState,
    pub iterations: usize,
    pub rankings: usize,
    pub recommendations: usize,
    pub sampling_seed: u64,
    pub metrics: RunMetricsSnapshot,
}

struct RunGuard {
    key: String,
    runs: Arc<DashMap<String, ()>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.runs.remove(&self.key);
    }
}

struct ComputedRun {
    state: PropagationState,
    iterations: usize,
    rankings: Vec<RankingRecord>,
    recommendations: Vec<RecommendationRecord>,
}

/// One batch recomputation: load, build, propagate, persist rankings,
/// sample, persist recommendations.
pub struct RecommendationJob {
    loader: Arc<dyn EntityLoader>,
    sink: Arc<dyn PersistenceSink>,
    config: AppConfig,
    // In-flight runs keyed by job key
    runs: Arc<DashMap<String, ()>>,
}

impl RecommendationJob {
    pub fn new(
        loader: Arc<dyn EntityLoader>,
        sink: Arc<dyn PersistenceSink>,
        config: AppConfig,
    ) -> Result<Self, JobError> {
        config.validate()?;
        Ok(Self {
            loader,
            sink,
            config,
            runs: Arc::new(DashMap::new()),
        })
    }

    pub fn is_running(&self) -> bool {
        self.runs.contains_key(RECOMMEND_JOB_KEY)
    }

    fn acquire(&self) -> Result<RunGuard, JobError> {
        use dashmap::mapref::entry::Entry;
        match self.runs.entry(RECOMMEND_JOB_KEY.to_string()) {
            Entry::Occupied(_) => Err(JobError::AlreadyRunning(RECOMMEND_JOB_KEY.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(RunGuard {
                    key: RECOMMEND_JOB_KEY.to_string(),
                    runs: self.runs.clone(),
                })
            }
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport, JobError> {
        let _guard = self.acquire()?;
        info!("Starting recommendation run as of {}", now.to_rfc3339());

        let metrics = RunMetricsCollector::default();
        let snapshot = self.loader.load().await?;
        info!("Loaded {} entity rows", snapshot.row_count());

        let seed = self
            .config
            .recommendation
            .sampling_seed
            .unwrap_or_else(rand_seed);
        let config = self.config.clone();
        let task_metrics = metrics.clone();

        let computed = tokio::task::spawn_blocking(move || {
            compute(&snapshot, &config, seed, now, task_metrics)
        })
        .await
        .map_err(|e| JobError::Task(e.to_string()))??;

        // Rankings are written unfiltered and before any sampling output.
        self.sink.write_rankings(&computed.rankings).await?;
        self.sink
            .write_recommendations(&computed.recommendations)
            .await?;

        let report = RunReport {
            generated_at: now,
            state: computed.state,
            iterations: computed.iterations,
            rankings: computed.rankings.len(),
            recommendations: computed.recommendations.len(),
            sampling_seed: seed,
            metrics: metrics.snapshot(),
        };
        info!(
            "Run finished: {} rankings, {} recommendations",
            report.rankings, report.recommendations
        );
        Ok(report)
    }
}

fn rand_seed() -> u64 {
    WeightedSampler::from_entropy().seed()
}

fn compute(
    snapshot: &EntitySnapshot,
    config: &AppConfig,
    seed: u64,
    now: DateTime<Utc>,
    metrics: RunMetricsCollector,
) -> Result<ComputedRun, JobError> {
    let graph = GraphBuilder::new(config.budgets.clone())
        .with_metrics(metrics.clone())
        .build(snapshot);

    let outcome = LabelPropagationEngine::new(config.propagation.clone())?
        .with_metrics(metrics.clone())
        .run(&graph);

    let rankings = extract_affinities(&graph, &outcome.assignment);
    metrics.record_rankings(rankings.len());

    let candidates = CandidateSelector::new(config.recommendation.recency_window()).select(
        &rankings,
        &snapshot.articles,
        &snapshot.recommendations,
        now,
    );
    metrics.record_candidates(candidates.len());

    let recommendations = WeightedSampler::new(seed)
        .with_metrics(metrics)
        .recommend(candidates, now);

    Ok(ComputedRun {
        state: outcome.state,
        iterations: outcome.iterations,
        rankings,
        recommendations,
    })
}
