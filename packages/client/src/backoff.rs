//! Reconnect delay policy for the push subscription.

use std::time::Duration;

/// Doubling reconnect delay.
///
/// The first error after a successful open waits `initial`; every further
/// consecutive error doubles the previous wait. No ceiling applies unless
/// `max` is configured.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Option<Duration>,
    retry_timeout: Duration,
    /// Whether the next error is the first one since the last open
    healthy: bool,
}

impl Backoff {
    pub fn new(initial: Duration, max: Option<Duration>) -> Self {
        Self {
            initial,
            max,
            retry_timeout: initial,
            healthy: true,
        }
    }

    /// Delay used for the most recently scheduled retry
    pub fn retry_timeout(&self) -> Duration {
        self.retry_timeout
    }

    /// The subscription opened; the next error starts over from `initial`.
    pub fn on_open(&mut self) {
        self.healthy = true;
    }

    /// The subscription failed; returns how long to wait before reconnecting.
    pub fn on_error(&mut self) -> Duration {
        self.retry_timeout = if self.healthy {
            self.initial
        } else {
            let doubled = self.retry_timeout.checked_mul(2).unwrap_or(Duration::MAX);
            match self.max {
                Some(max) => doubled.min(max),
                None => doubled,
            }
        };
        self.healthy = false;
        self.retry_timeout
    }

    /// Back to the freshly constructed state
    pub fn reset(&mut self) {
        self.retry_timeout = self.initial;
        self.healthy = true;
    }
}
