//! Utilities shared by the RoomSync client and server.

pub mod logger;
pub mod time;
