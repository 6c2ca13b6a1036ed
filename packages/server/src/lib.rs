//! In-memory room backend for RoomSync.
//!
//! Stores keyed `{timestamp, value}` records per room, stamps writes with the
//! server clock and streams every change to subscribers as server-sent events.

pub mod error;
pub mod handler;
pub mod query;
pub mod server;
pub mod signal;
pub mod store;

pub use server::Server;
pub use store::RoomStore;
