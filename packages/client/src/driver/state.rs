//! Observable connection state.

use std::time::Duration;

/// Phase of the connection state machine
///
/// ```text
/// Idle -> Connecting -> Open -> (Backoff -> Connecting -> Open)* -> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No room requested yet
    #[default]
    Idle,
    /// Subscription requested, not yet open
    Connecting,
    /// Subscription delivering events
    Open,
    /// Subscription failed; a reconnect is scheduled
    Backoff,
    /// Torn down by the caller
    Closed,
}

/// Snapshot of the driver's connection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub phase: ConnectionPhase,
    /// Room selected through the driver handle; room-scoped calls use it
    pub room_token: Option<String>,
    /// Offset to server time; `None` until the current attempt has synced
    pub clock_skew: Option<i64>,
    /// Delay of the most recently scheduled reconnect
    pub retry_timeout: Duration,
    /// Whether the latest-record probe found the room empty
    pub room_empty: Option<bool>,
}
