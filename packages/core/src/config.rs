//! Engine configuration
//!
//! `EngineConfig` is built once by the embedding process (API server, seed
//! tool, `tree-maint`) and handed to `HierarchyService::open`. It is immutable
//! for the lifetime of the service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "HIERARCHY_DATA_DIR";

/// Environment variable overriding the tree lock timeout (milliseconds)
pub const LOCK_TIMEOUT_ENV: &str = "HIERARCHY_LOCK_TIMEOUT_MS";

/// Environment variable overriding the SQLite busy timeout (milliseconds)
pub const BUSY_TIMEOUT_ENV: &str = "HIERARCHY_BUSY_TIMEOUT_MS";

/// Configuration for the hierarchy engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding one database file per tree kind
    pub data_dir: PathBuf,

    /// How long a mutation waits for its tree's write lock before failing
    /// with a "tree busy" error
    pub lock_timeout_ms: u64,

    /// SQLite busy timeout applied to every connection
    pub busy_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            lock_timeout_ms: 5000,
            busy_timeout_ms: 5000,
        }
    }
}

impl EngineConfig {
    /// Default configuration rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Default configuration overridden by `HIERARCHY_*` environment variables
    ///
    /// Unparseable values are ignored with a warning and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parse_millis(LOCK_TIMEOUT_ENV) {
            config.lock_timeout_ms = ms;
        }
        if let Some(ms) = parse_millis(BUSY_TIMEOUT_ENV) {
            config.busy_timeout_ms = ms;
        }

        config
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn parse_millis(var: &str) -> Option<u64> {
    let raw = std::env::var(var).ok()?;
    match raw.parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number of milliseconds", var, raw);
            None
        }
    }
}
