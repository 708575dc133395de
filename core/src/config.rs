use crate::error::{ErrorCode, NewsrankError};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("config source error: {0}")]
    Source(#[from] ConfigError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl NewsrankError for ConfigLoadError {
    fn error_code(&self) -> ErrorCode {
        match self {
            ConfigLoadError::Source(_) => ErrorCode::Internal,
            ConfigLoadError::Invalid(_) => ErrorCode::InvalidArgument,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PropagationConfig {
    pub min_iterations: usize,
    pub max_iterations: usize,
    pub convergence_threshold: f64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            min_iterations: 3,
            max_iterations: 15,
            convergence_threshold: 0.05,
        }
    }
}

impl PropagationConfig {
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.max_iterations == 0 {
            return Err(ConfigLoadError::Invalid(
                "propagation.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.min_iterations > self.max_iterations {
            return Err(ConfigLoadError::Invalid(format!(
                "propagation.min_iterations ({}) exceeds max_iterations ({})",
                self.min_iterations, self.max_iterations
            )));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold <= 0.0 {
            return Err(ConfigLoadError::Invalid(format!(
                "propagation.convergence_threshold must be positive, got {}",
                self.convergence_threshold
            )));
        }
        Ok(())
    }
}

/// Total outbound weight each source node spends per relation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EdgeBudgets {
    pub category_to_article: f64,
    pub user_to_user: f64,
    pub user_to_category: f64,
    pub user_to_article: f64,
    /// Shared by article -> category and article -> liker edges.
    pub article_outbound: f64,
    pub category_to_user: f64,
}

impl Default for EdgeBudgets {
    fn default() -> Self {
        Self {
            category_to_article: 0.5,
            user_to_user: 0.3,
            user_to_category: 0.3,
            user_to_article: 0.4,
            article_outbound: 1.0,
            category_to_user: 0.5,
        }
    }
}

impl EdgeBudgets {
    fn values(&self) -> [(&'static str, f64); 6] {
        [
            ("category_to_article", self.category_to_article),
            ("user_to_user", self.user_to_user),
            ("user_to_category", self.user_to_category),
            ("user_to_article", self.user_to_article),
            ("article_outbound", self.article_outbound),
            ("category_to_user", self.category_to_user),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        for (name, value) in self.values() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigLoadError::Invalid(format!(
                    "budgets.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RecommendationConfig {
    pub recency_window_secs: u64,
    /// Fixed seed for reproducible sampling. Drawn from entropy when unset.
    pub sampling_seed: Option<u64>,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            recency_window_secs: 24 * 60 * 60,
            sampling_seed: None,
        }
    }
}

impl RecommendationConfig {
    fn checked_window(&self) -> Option<chrono::Duration> {
        i64::try_from(self.recency_window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }

    /// Saturates at `Duration::MAX`; `validate` rejects windows that would.
    pub fn recency_window(&self) -> chrono::Duration {
        self.checked_window().unwrap_or(chrono::Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.checked_window().is_none() {
            return Err(ConfigLoadError::Invalid(format!(
                "recommendation.recency_window_secs out of range: {}",
                self.recency_window_secs
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub input_dir: String,
    pub output_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            input_dir: "data/input".to_string(),
            output_dir: "data/output".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub propagation: PropagationConfig,
    pub budgets: EdgeBudgets,
    pub recommendation: RecommendationConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigLoadError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("NEWSRANK")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a single file without the run-mode and environment layers.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let builder = Config::builder().add_source(File::from(path));

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        self.propagation.validate()?;
        self.budgets.validate()?;
        self.recommendation.validate()
    }
}
