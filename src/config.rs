//! Runtime configuration from the environment (and `.env` during development).

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::store::SqliteStore;

pub const DEFAULT_MODEL: &str = "gemini-flash";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Short model name, resolved by `ai::resolve_model`.
    pub model: String,
    pub db_path: PathBuf,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let model = lookup("JOBINTEL_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let db_path = lookup("JOBINTEL_DB")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(SqliteStore::default_path);

        let (var, log_filter) = match lookup("JOBINTEL_LOG") {
            Some(filter) => ("JOBINTEL_LOG", filter),
            None => match lookup("RUST_LOG") {
                Some(filter) => ("RUST_LOG", filter),
                None => ("JOBINTEL_LOG", DEFAULT_LOG_FILTER.to_string()),
            },
        };
        EnvFilter::try_new(&log_filter)
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string()))?;

        Ok(Self { model, db_path, log_filter })
    }

    /// Applies command-line overrides.
    pub fn with_overrides(mut self, model: Option<String>, db: Option<PathBuf>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(db) = db {
            self.db_path = db;
        }
        self
    }

    /// Log file used while the terminal UI owns the screen.
    pub fn log_path(&self) -> PathBuf {
        self.db_path.with_file_name("jobintel.log")
    }
}
