use crate::error::StorageError;
use async_trait::async_trait;
use newsrank_core::model::{RankingRecord, RecommendationRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::RwLock;
use tracing::info;

pub const ARTICLE_RANKINGS_FILE: &str = "articlerankings.jsonl";
pub const RECOMMENDED_ARTICLES_FILE: &str = "recommendedarticles.jsonl";

/// Durable destination for run output. Retry policy, if any, lives here.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn write_rankings(&self, records: &[RankingRecord]) -> Result<(), StorageError>;
    async fn write_recommendations(
        &self,
        records: &[RecommendationRecord],
    ) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemorySink {
    rankings: RwLock<Vec<RankingRecord>>,
    recommendations: RwLock<Vec<RecommendationRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rankings(&self) -> Vec<RankingRecord> {
        self.rankings.read().await.clone()
    }

    pub async fn recommendations(&self) -> Vec<RecommendationRecord> {
        self.recommendations.read().await.clone()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn write_rankings(&self, records: &[RankingRecord]) -> Result<(), StorageError> {
        self.rankings.write().await.extend_from_slice(records);
        Ok(())
    }

    async fn write_recommendations(
        &self,
        records: &[RecommendationRecord],
    ) -> Result<(), StorageError> {
        self.recommendations.write().await.extend_from_slice(records);
        Ok(())
    }
}

/// Appends one JSON object per line under a caller-supplied directory.
pub struct JsonLinesSink {
    dir: PathBuf,
}

impl JsonLinesSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn rankings_path(&self) -> PathBuf {
        self.dir.join(ARTICLE_RANKINGS_FILE)
    }

    pub fn recommendations_path(&self) -> PathBuf {
        self.dir.join(RECOMMENDED_ARTICLES_FILE)
    }

    async fn append_batch<T: Serialize>(&self, path: &Path, records: &[T]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let mut writer = BufWriter::new(file);

        for record in records {
            let mut line = serde_json::to_vec(record)?;
            line.push(b'\n');
            writer.write_all(&line).await?;
        }

        writer.flush().await?;
        writer.get_ref().sync_all().await?;

        info!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for JsonLinesSink {
    async fn write_rankings(&self, records: &[RankingRecord]) -> Result<(), StorageError> {
        self.append_batch(&self.rankings_path(), records).await
    }

    async fn write_recommendations(
        &self,
        records: &[RecommendationRecord],
    ) -> Result<(), StorageError> {
        self.append_batch(&self.recommendations_path(), records)
            .await
    }
}
