//! Driver configuration.

use std::time::Duration;

use url::Url;

use crate::error::SyncError;

/// Delay before the first reconnect after a healthy connection fails.
pub const INITIAL_RETRY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default upper bound on the number of chat records fetched per range query.
pub const MAX_LIMIT: u32 = 1000;

/// Default span of chat history requested when (re)connecting.
pub const HISTORY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// How repeated deliveries of the same chat record are handled.
///
/// The history fetch and the live subscription can both deliver a record, and
/// every reconnect replays the history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Dispatch every delivery; deduplication is left to the consumer.
    #[default]
    AtLeastOnce,
    /// Remember dispatched chat keys for the lifetime of the driver and
    /// dispatch each key at most once.
    AtMostOnce,
}

/// Settings for a [`SyncDriver`](crate::SyncDriver).
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Root of the record tree; rooms live at `<base_url>/<room>/`
    pub base_url: String,
    /// First backoff delay after a subscription error
    pub initial_retry_timeout: Duration,
    /// Optional ceiling for the doubling backoff; `None` doubles without bound
    pub max_retry_timeout: Option<Duration>,
    /// Default `limitToLast` for chat range queries
    pub max_limit: u32,
    /// Longest span of history requested during bootstrap
    pub history_window: Duration,
    /// Duplicate handling for chat records
    pub delivery: DeliveryMode,
}

impl DriverConfig {
    /// Create a configuration with default tuning for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            initial_retry_timeout: INITIAL_RETRY_TIMEOUT,
            max_retry_timeout: None,
            max_limit: MAX_LIMIT,
            history_window: HISTORY_WINDOW,
            delivery: DeliveryMode::default(),
        }
    }

    /// Check the settings and normalise the base URL (no trailing slash).
    pub fn validate(mut self) -> Result<Self, SyncError> {
        let parsed = Url::parse(&self.base_url).map_err(|e| {
            SyncError::Configuration(format!("invalid base URL '{}': {}", self.base_url, e))
        })?;
        if parsed.cannot_be_a_base() {
            return Err(SyncError::Configuration(format!(
                "base URL '{}' cannot hold room paths",
                self.base_url
            )));
        }
        if self.initial_retry_timeout.is_zero() {
            return Err(SyncError::Configuration(
                "initial_retry_timeout must be positive".to_string(),
            ));
        }
        if self.max_limit == 0 {
            return Err(SyncError::Configuration(
                "max_limit must be positive".to_string(),
            ));
        }

        self.base_url = self.base_url.trim_end_matches('/').to_string();
        Ok(self)
    }
}
