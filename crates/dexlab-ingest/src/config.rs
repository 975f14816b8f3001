//! Ingestion configuration, loaded from defaults, the environment, or flags.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_INDEX_LIMIT: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Catalog API root, without a trailing slash.
    pub base_url: String,
    /// `limit` passed to the index request; must cover the whole catalog.
    pub index_limit: usize,
    /// Detail requests issued concurrently per batch.
    pub batch_size: usize,
    /// Per-request timeout. There is no timeout on the run as a whole.
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            index_limit: DEFAULT_INDEX_LIMIT,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl IngestConfig {
    /// Defaults overridden by `DEXLAB_BASE_URL`, `DEXLAB_INDEX_LIMIT`,
    /// `DEXLAB_BATCH_SIZE` and `DEXLAB_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("DEXLAB_BASE_URL") {
            config.base_url = url;
        }
        if let Some(n) = env_number("DEXLAB_INDEX_LIMIT")? {
            config.index_limit = n as usize;
        }
        if let Some(n) = env_number("DEXLAB_BATCH_SIZE")? {
            config.batch_size = n as usize;
        }
        if let Some(n) = env_number("DEXLAB_TIMEOUT_SECS")? {
            config.timeout_secs = n;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url is empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".to_string()));
        }
        if self.index_limit == 0 {
            return Err(ConfigError::Invalid("index_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn index_url(&self) -> String {
        format!(
            "{}/pokemon?limit={}",
            self.base_url.trim_end_matches('/'),
            self.index_limit
        )
    }
}

fn env_number(key: &str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{key}={raw} is not a whole number"))),
        Err(_) => Ok(None),
    }
}
