//! Transport seam between the driver and the backend.
//!
//! A transport performs request/response calls and runs push subscriptions.
//! [`HttpTransport`] talks to a real backend; tests substitute their own.

mod http;
mod sse;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::SyncError;

pub use http::HttpTransport;
pub use sse::{SseDecoder, SseFrame};

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
        }
    }
}

/// What accompanies a request
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    /// Pre-built query string, appended after `?` (GET only)
    Query(String),
    /// JSON request body (PUT only)
    Json(Value),
}

/// One event from a push subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// The stream is established
    Open,
    /// A named event with its raw `data` field
    Message { event: String, data: String },
    /// The stream failed or ended
    Error(String),
}

/// Where a running subscription delivers its events
pub type PushSender = mpsc::UnboundedSender<PushEvent>;

/// Request/response calls and push subscriptions against the record tree
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one call and return the parsed JSON body of a 2xx response.
    ///
    /// Non-2xx responses fail with [`SyncError::Request`].
    async fn request(&self, method: Method, url: &str, payload: Payload)
    -> Result<Value, SyncError>;

    /// Run a push subscription on `url` until it fails or ends.
    ///
    /// Sends [`PushEvent::Open`] once established, then one
    /// [`PushEvent::Message`] per event. Returning (either way) ends the
    /// subscription; the caller reports the failure.
    async fn subscribe(&self, url: &str, events: PushSender) -> Result<(), SyncError>;
}
