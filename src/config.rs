use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Directory created inside the vault to hold the index, unless an explicit
/// index location is configured.
pub const DEFAULT_INDEX_DIR: &str = ".notemill";

/// Bounded fixed-delay retry for writer-lock contention.
///
/// Contention is expected to be rare (single process, low note churn), so a
/// short spin with a fixed delay is enough; after the attempts are exhausted
/// the caller falls back to the last committed index state.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            delay: Duration::from_millis(250),
        }
    }
}

/// Configuration for opening a [`crate::Vault`].
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Directory holding the note files.
    pub storage_dir: PathBuf,
    /// Index location override. Defaults to `<storage_dir>/.notemill`.
    pub index_dir: Option<PathBuf>,
    /// Retry behavior for index-lock contention during sync.
    pub retry: RetryPolicy,
}

impl VaultConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            index_dir: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Builds a configuration from environment variables.
    ///
    /// `NOTEMILL_PATH` is mandatory; `NOTEMILL_INDEX_PATH`,
    /// `NOTEMILL_SYNC_RETRIES` and `NOTEMILL_SYNC_RETRY_DELAY_MS` are
    /// optional overrides.
    pub fn from_env() -> Result<Self> {
        let storage_dir = env::var("NOTEMILL_PATH")
            .map_err(|_| Error::Config("environment variable NOTEMILL_PATH must be set".into()))?;

        let mut config = Self::new(storage_dir);
        config.index_dir = env::var_os("NOTEMILL_INDEX_PATH").map(PathBuf::from);

        if let Ok(value) = env::var("NOTEMILL_SYNC_RETRIES") {
            config.retry.max_attempts = value.parse().map_err(|_| {
                Error::Config(format!("invalid value '{}' for NOTEMILL_SYNC_RETRIES", value))
            })?;
        }
        if let Ok(value) = env::var("NOTEMILL_SYNC_RETRY_DELAY_MS") {
            let millis: u64 = value.parse().map_err(|_| {
                Error::Config(format!(
                    "invalid value '{}' for NOTEMILL_SYNC_RETRY_DELAY_MS",
                    value
                ))
            })?;
            config.retry.delay = Duration::from_millis(millis);
        }

        Ok(config)
    }
}
