//! Realtime room synchronization driver.
//!
//! Keeps a client in sync with one room of a keyed record tree: sortable
//! record ids, server clock correction, a reconnecting push subscription and
//! translation of chat records into dispatcher actions.

pub mod actions;
pub mod api;
pub mod backoff;
pub mod cli;
pub mod clock_sync;
pub mod config;
pub mod driver;
pub mod error;
pub mod id;
pub mod processor;
pub mod push;
pub mod query;
pub mod record;
pub mod transport;

#[cfg(test)]
mod testing;

pub use actions::{Action, Dispatcher};
pub use api::{ChatRange, RoomApi, SendTextChatMessage};
pub use config::{DeliveryMode, DriverConfig};
pub use driver::{ConnectionPhase, ConnectionStatus, SyncDriver, SyncDriverBuilder};
pub use error::{ErrorKind, SyncError};
