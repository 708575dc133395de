use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jobs::{ChannelJobQueue, Job, JobError, JobQueue, RecommendationJob, Worker};
use newsrank_core::config::AppConfig;
use newsrank_core::error::{ErrorCode, NewsrankError};
use newsrank_core::model::{ArticleRecord, RankingRecord, RecommendationRecord, UserRecord};
use propagation::PropagationState;
use std::sync::Arc;
use storage::loader::{EntityLoader, EntitySnapshot, JsonDirLoader, MemoryLoader};
use storage::sink::{JsonLinesSink, MemorySink};
use storage::StorageError;
use tempfile::tempdir;
use tokio::sync::Notify;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
}

fn seeded_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.recommendation.sampling_seed = Some(7);
    config
}

fn single_interest_snapshot() -> EntitySnapshot {
    EntitySnapshot {
        articles: vec![
            ArticleRecord {
                article_uuid: "p".to_string(),
                category: "x".to_string(),
                date: now() - Duration::hours(3),
            },
            ArticleRecord {
                article_uuid: "old".to_string(),
                category: "x".to_string(),
                date: now() - Duration::days(3),
            },
        ],
        users: vec![
            UserRecord {
                username: "a".to_string(),
                interests: vec!["x".to_string()],
            },
            UserRecord {
                username: "b".to_string(),
                interests: Vec::new(),
            },
        ],
        ..Default::default()
    }
}

/// Blocks inside `load` until released, keeping a run in flight.
struct GatedLoader {
    gate: Arc<Notify>,
    snapshot: EntitySnapshot,
}

#[async_trait]
impl EntityLoader for GatedLoader {
    async fn load(&self) -> Result<EntitySnapshot, StorageError> {
        self.gate.notified().await;
        Ok(self.snapshot.clone())
    }
}

#[tokio::test]
async fn test_run_persists_rankings_and_recommendations() {
    let sink = Arc::new(MemorySink::new());
    let job = RecommendationJob::new(
        Arc::new(MemoryLoader::new(single_interest_snapshot())),
        sink.clone(),
        seeded_config(),
    )
    .unwrap();

    let report = job.run(now()).await.unwrap();

    assert_eq!(report.state, PropagationState::Converged);
    assert_eq!(report.iterations, 3);
    assert_eq!(report.sampling_seed, 7);
    assert_eq!(report.metrics.seeds, 1);
    assert_eq!(report.metrics.terminal_state.as_deref(), Some("converged"));

    // Rankings keep stale articles; recommendations do not.
    let rankings = sink.rankings().await;
    assert_eq!(rankings.len(), 2);
    assert_eq!(report.rankings, 2);
    assert!(rankings
        .iter()
        .all(|r| r.username == "a" && (r.adsorption_weight - 1.0).abs() < 1e-9));

    let recommendations = sink.recommendations().await;
    assert_eq!(recommendations.len(), 1);
    assert_eq!(report.recommendations, 1);
    assert_eq!(recommendations[0].username, "a");
    assert_eq!(recommendations[0].article_uuid, "p");
    assert!(recommendations[0].rec_uuid.starts_with(&now().to_rfc3339()));
    assert!(!job.is_running());
}

#[tokio::test]
async fn test_run_without_seeds_writes_nothing() {
    let mut snapshot = single_interest_snapshot();
    for user in &mut snapshot.users {
        user.interests.clear();
    }
    let sink = Arc::new(MemorySink::new());
    let job = RecommendationJob::new(
        Arc::new(MemoryLoader::new(snapshot)),
        sink.clone(),
        seeded_config(),
    )
    .unwrap();

    let report = job.run(now()).await.unwrap();

    assert_eq!(report.state, PropagationState::Converged);
    assert_eq!(report.iterations, 0);
    assert!(sink.rankings().await.is_empty());
    assert!(sink.recommendations().await.is_empty());
}

#[tokio::test]
async fn test_invalid_config_is_rejected_up_front() {
    let mut config = AppConfig::default();
    config.propagation.min_iterations = 30;

    let err = RecommendationJob::new(
        Arc::new(MemoryLoader::new(EntitySnapshot::default())),
        Arc::new(MemorySink::new()),
        config,
    )
    .err()
    .unwrap();

    assert!(matches!(err, JobError::Config(_)));
    assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn test_overlapping_runs_are_refused() {
    let gate = Arc::new(Notify::new());
    let job = Arc::new(
        RecommendationJob::new(
            Arc::new(GatedLoader {
                gate: gate.clone(),
                snapshot: single_interest_snapshot(),
            }),
            Arc::new(MemorySink::new()),
            seeded_config(),
        )
        .unwrap(),
    );

    let first = {
        let job = job.clone();
        tokio::spawn(async move { job.run(now()).await })
    };
    while !job.is_running() {
        tokio::task::yield_now().await;
    }

    let err = job.run(now()).await.unwrap_err();
    assert!(matches!(err, JobError::AlreadyRunning(_)));
    assert_eq!(err.error_code(), ErrorCode::Aborted);

    gate.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.recommendations, 1);
    assert!(!job.is_running());
}

#[tokio::test]
async fn test_json_tables_to_jsonl_output() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let date = (now() - Duration::hours(1)).to_rfc3339();

    let tables = [
        (
            "articles",
            format!(r#"[{{"articleUUID":"p1","category":"tech","date":"{}"}}]"#, date),
        ),
        ("articlelikes", r#"[{"articleUUID":"p1","username":"bob"}]"#.to_string()),
        (
            "users",
            r#"[{"username":"alice","interests":["tech"]},{"username":"bob"}]"#.to_string(),
        ),
        (
            "friendships",
            r#"[{"username":"alice","friendUsername":"bob","confirmed":true}]"#.to_string(),
        ),
        ("recommendedarticles", "[]".to_string()),
    ];
    for (table, body) in &tables {
        std::fs::write(input.path().join(format!("{}.json", table)), body).unwrap();
    }

    let sink = Arc::new(JsonLinesSink::new(output.path()));
    let job = RecommendationJob::new(
        Arc::new(JsonDirLoader::new(input.path())),
        sink.clone(),
        seeded_config(),
    )
    .unwrap();
    let report = job.run(now()).await.unwrap();

    let rankings: Vec<RankingRecord> = std::fs::read_to_string(sink.rankings_path())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rankings.len(), report.rankings);
    assert!(rankings.iter().all(|r| r.username == "alice" && r.article_uuid == "p1"));

    let recommendations: Vec<RecommendationRecord> =
        std::fs::read_to_string(sink.recommendations_path())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0].username, "alice");
    assert_eq!(recommendations[0].article_uuid, "p1");
}

fn write_single_article_tables(dir: &std::path::Path) {
    let date = (now() - Duration::hours(1)).to_rfc3339();
    let tables = [
        (
            "articles",
            format!(r#"[{{"articleUUID":"p1","category":"tech","date":"{}"}}]"#, date),
        ),
        ("articlelikes", "[]".to_string()),
        ("users", r#"[{"username":"alice","interests":["tech"]}]"#.to_string()),
        ("friendships", "[]".to_string()),
        ("recommendedarticles", "[]".to_string()),
    ];
    for (table, body) in &tables {
        std::fs::write(dir.join(format!("{}.json", table)), body).unwrap();
    }
}

fn read_recommendations(path: std::path::PathBuf) -> Vec<RecommendationRecord> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_second_run_skips_pairs_already_recommended() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_single_article_tables(input.path());

    let sink = Arc::new(JsonLinesSink::new(output.path()));
    let job = RecommendationJob::new(
        Arc::new(JsonDirLoader::new(input.path()).with_history(output.path())),
        sink.clone(),
        seeded_config(),
    )
    .unwrap();

    let first = job.run(now()).await.unwrap();
    assert_eq!(first.recommendations, 1);

    let second = job.run(now() + Duration::minutes(5)).await.unwrap();
    assert_eq!(second.recommendations, 0);
    assert_eq!(second.metrics.candidates, 0);
    // Rankings are not filtered by history.
    assert_eq!(second.rankings, first.rankings);

    let pairs: Vec<(String, String)> = read_recommendations(sink.recommendations_path())
        .into_iter()
        .map(|r| (r.username, r.article_uuid))
        .collect();
    assert_eq!(pairs, vec![("alice".to_string(), "p1".to_string())]);
}

#[tokio::test]
async fn test_worker_drains_queue() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_single_article_tables(input.path());

    let sink = Arc::new(JsonLinesSink::new(output.path()));
    let job = Arc::new(
        RecommendationJob::new(
            Arc::new(JsonDirLoader::new(input.path()).with_history(output.path())),
            sink.clone(),
            seeded_config(),
        )
        .unwrap(),
    );
    let (queue, receiver) = ChannelJobQueue::bounded(4);
    let worker = tokio::spawn(Worker::new(receiver, job).run());

    queue
        .enqueue(Job::RecommendArticles { requested_at: now() })
        .await
        .unwrap();
    queue
        .enqueue(Job::RecommendArticles {
            requested_at: now() + Duration::minutes(30),
        })
        .await
        .unwrap();
    drop(queue);

    // Both runs complete; the second finds nothing new to recommend.
    assert_eq!(worker.await.unwrap(), 2);
    assert_eq!(read_recommendations(sink.recommendations_path()).len(), 1);
}
