//! Server-corrected time.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use roomsync_shared::time::Clock;

/// Local clock plus the signed offset to the server's clock.
///
/// The offset starts at zero and is replaced after every successful clock
/// sync read. Only the connection task writes it.
pub struct ServerClock {
    clock: Arc<dyn Clock>,
    skew_ms: AtomicI64,
}

impl ServerClock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            skew_ms: AtomicI64::new(0),
        }
    }

    /// Local time in milliseconds, uncorrected
    pub fn local_now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Current skew; positive means the server is ahead
    pub fn skew(&self) -> i64 {
        self.skew_ms.load(Ordering::SeqCst)
    }

    /// Estimated server time now
    pub fn server_time(&self) -> i64 {
        self.server_time_at(self.local_now())
    }

    /// Estimated server time at the given local time
    pub fn server_time_at(&self, local_ms: i64) -> i64 {
        local_ms.saturating_add(self.skew())
    }

    /// Record the result of a clock sync read and return the new skew.
    pub fn apply_sync(&self, server_timestamp: i64, local_at_completion: i64) -> i64 {
        let skew = server_timestamp.saturating_sub(local_at_completion);
        self.skew_ms.store(skew, Ordering::SeqCst);
        tracing::debug!(
            "Clock synced: server={} local={} skew={}ms",
            server_timestamp,
            local_at_completion,
            skew
        );
        skew
    }

    /// Forget the skew, e.g. when a new connection attempt starts
    pub fn reset(&self) {
        self.skew_ms.store(0, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn set_skew(&self, skew: i64) {
        self.skew_ms.store(skew, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for ServerClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerClock")
            .field("skew_ms", &self.skew())
            .finish_non_exhaustive()
    }
}
