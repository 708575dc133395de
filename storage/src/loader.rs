use crate::error::StorageError;
use crate::sink::RECOMMENDED_ARTICLES_FILE;
use async_trait::async_trait;
use newsrank_core::model::{
    ArticleLikeRecord, ArticleRecord, FriendshipRecord, RecommendationRecord,
    RecommendedArticleRecord, UserRecord,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::info;

pub const ARTICLES_TABLE: &str = "articles";
pub const ARTICLE_LIKES_TABLE: &str = "articlelikes";
pub const USERS_TABLE: &str = "users";
pub const FRIENDSHIPS_TABLE: &str = "friendships";
pub const RECOMMENDED_ARTICLES_TABLE: &str = "recommendedarticles";

/// One consistent read of every relation the graph job consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub articles: Vec<ArticleRecord>,
    pub likes: Vec<ArticleLikeRecord>,
    pub users: Vec<UserRecord>,
    pub friendships: Vec<FriendshipRecord>,
    pub recommendations: Vec<RecommendedArticleRecord>,
}

impl EntitySnapshot {
    pub fn row_count(&self) -> usize {
        self.articles.len()
            + self.likes.len()
            + self.users.len()
            + self.friendships.len()
            + self.recommendations.len()
    }
}

#[async_trait]
pub trait EntityLoader: Send + Sync {
    async fn load(&self) -> Result<EntitySnapshot, StorageError>;
}

/// Serves a fixed snapshot.
pub struct MemoryLoader {
    snapshot: EntitySnapshot,
}

impl MemoryLoader {
    pub fn new(snapshot: EntitySnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl EntityLoader for MemoryLoader {
    async fn load(&self) -> Result<EntitySnapshot, StorageError> {
        Ok(self.snapshot.clone())
    }
}

/// Reads each table from `<dir>/<table>.json`, a JSON array of rows.
///
/// With a history directory, recommendations a [`crate::JsonLinesSink`]
/// appended there are read back and join the prior recommendations.
pub struct JsonDirLoader {
    dir: PathBuf,
    history_dir: Option<PathBuf>,
}

impl JsonDirLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            history_dir: None,
        }
    }

    pub fn with_history(mut self, dir: impl Into<PathBuf>) -> Self {
        self.history_dir = Some(dir.into());
        self
    }

    /// Emitted recommendations from `<history>/recommendedarticles.jsonl`.
    /// A missing file means no run has written there yet.
    async fn scan_history(&self, history: &Path) -> Result<Vec<RecommendedArticleRecord>, StorageError> {
        let path = history.join(RECOMMENDED_ARTICLES_FILE);
        let mut buf = String::new();
        {
            let mut file = match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            file.read_to_string(&mut buf).await?;
        }

        let rows = buf
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str::<RecommendationRecord>(line)
                    .map(RecommendedArticleRecord::from)
                    .map_err(|source| StorageError::Decode {
                        table: RECOMMENDED_ARTICLES_TABLE,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!("Read {} emitted recommendations from {}", rows.len(), path.display());
        Ok(rows)
    }

    async fn scan_table<T: DeserializeOwned>(&self, table: &'static str) -> Result<Vec<T>, StorageError> {
        let path = self.dir.join(format!("{}.json", table));
        let mut buf = Vec::new();
        {
            // The handle is released before decoding starts.
            let mut file = match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::MissingTable(path));
                }
                Err(e) => return Err(e.into()),
            };
            file.read_to_end(&mut buf).await?;
        }

        let rows: Vec<T> =
            serde_json::from_slice(&buf).map_err(|source| StorageError::Decode { table, source })?;
        info!("Scanned {} rows from {}", rows.len(), table);
        Ok(rows)
    }
}

#[async_trait]
impl EntityLoader for JsonDirLoader {
    async fn load(&self) -> Result<EntitySnapshot, StorageError> {
        let articles = self.scan_table(ARTICLES_TABLE).await?;
        let likes = self.scan_table(ARTICLE_LIKES_TABLE).await?;
        let users = self.scan_table(USERS_TABLE).await?;
        let friendships = self.scan_table(FRIENDSHIPS_TABLE).await?;
        let mut recommendations: Vec<RecommendedArticleRecord> =
            self.scan_table(RECOMMENDED_ARTICLES_TABLE).await?;
        if let Some(history) = &self.history_dir {
            recommendations.extend(self.scan_history(history).await?);
        }

        Ok(EntitySnapshot {
            articles,
            likes,
            users,
            friendships,
            recommendations,
        })
    }
}
