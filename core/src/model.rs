use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    User,
    Article,
    Category,
}

impl NodeKind {
    /// Namespace prefix that keeps keys of different kinds from colliding.
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeKind::User => "user/",
            NodeKind::Article => "uuid/",
            NodeKind::Category => "catg/",
        }
    }
}

/// Graph vertex identity: `(kind, key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub kind: NodeKind,
    pub key: String,
}

impl NodeId {
    pub fn new(kind: NodeKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    pub fn user(key: impl Into<String>) -> Self {
        Self::new(NodeKind::User, key)
    }

    pub fn article(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Article, key)
    }

    pub fn category(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Category, key)
    }

    pub fn is_user(&self) -> bool {
        self.kind == NodeKind::User
    }

    pub fn is_article(&self) -> bool {
        self.kind == NodeKind::Article
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.key)
    }
}

// Input rows. Field names follow the source tables.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    #[serde(rename = "articleUUID")]
    pub article_uuid: String,
    pub category: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleLikeRecord {
    #[serde(rename = "articleUUID")]
    pub article_uuid: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendshipRecord {
    pub username: String,
    pub friend_username: String,
    pub confirmed: bool,
}

/// A recommendation made by an earlier run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedArticleRecord {
    pub username: String,
    #[serde(rename = "articleUUID")]
    pub article_uuid: String,
    pub article_date: DateTime<Utc>,
}

// Output rows.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRecord {
    pub username: String,
    #[serde(rename = "articleUUID")]
    pub article_uuid: String,
    pub adsorption_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRecord {
    pub username: String,
    #[serde(rename = "articleUUID")]
    pub article_uuid: String,
    #[serde(rename = "recUUID")]
    pub rec_uuid: String,
    pub article_date: DateTime<Utc>,
}

impl From<RecommendationRecord> for RecommendedArticleRecord {
    fn from(rec: RecommendationRecord) -> Self {
        Self {
            username: rec.username,
            article_uuid: rec.article_uuid,
            article_date: rec.article_date,
        }
    }
}
