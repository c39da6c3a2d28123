use std::path::PathBuf;
use std::time::Duration;

use tix_core::db::StoreOptions;

pub const DEFAULT_DB_PATH: &str = "tix.sqlite";
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Runtime settings, resolved from flags with environment fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    /// `None` disables notifications.
    pub webhook_url: Option<String>,
    pub notify_timeout: Duration,
    pub store_timeout: Duration,
}

impl Config {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            webhook_url: None,
            notify_timeout: Duration::from_millis(DEFAULT_NOTIFY_TIMEOUT_MS),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: self.store_timeout,
        }
    }
}
