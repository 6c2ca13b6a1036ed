//! Error types for the RoomSync driver.

use thiserror::Error;

/// Broad error category, mirrored by the names surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A request/response call failed or returned a non-2xx status.
    Request,
    /// The push subscription (or the driver task behind it) failed.
    Connection,
    /// A required collaborator or setting is missing or invalid.
    Configuration,
    /// A response body could not be decoded.
    Decode,
}

impl ErrorKind {
    /// Stable machine-readable name of the error kind.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Request => "REQUEST_ERROR",
            ErrorKind::Connection => "CONNECTION_ERROR",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::Decode => "DECODE_ERROR",
        }
    }
}

/// Errors returned by the sync driver and its transports
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backend answered with a non-2xx status
    #[error("Request failed with status {status}: {response_text}")]
    Request {
        status: u16,
        /// Raw response body, kept for diagnostics
        response_text: String,
    },

    /// The request never produced a response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Push subscription failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Missing or invalid collaborator/setting
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A room-scoped call was made before any room was connected
    #[error("No room token: connect to a room first")]
    NoActiveRoom,

    /// Malformed JSON in a response body
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SyncError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Request { .. } | SyncError::Http(_) => ErrorKind::Request,
            SyncError::Connection(_) => ErrorKind::Connection,
            SyncError::Configuration(_) | SyncError::NoActiveRoom => ErrorKind::Configuration,
            SyncError::Decode(_) => ErrorKind::Decode,
        }
    }

    /// Shorthand for `self.kind().name()`.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Raw response text of a failed request, if the backend answered at all.
    pub fn response_text(&self) -> Option<&str> {
        match self {
            SyncError::Request { response_text, .. } => Some(response_text),
            _ => None,
        }
    }
}
