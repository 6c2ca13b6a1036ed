//! Room-scoped calls against the record tree.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    clock_sync::ServerClock,
    error::SyncError,
    id::make_id,
    query::{build_query, build_url, json_quote},
    record::{ChatContentType, KEY_SEPARATOR, RecordKind, RecordMap, RecordWrite},
    transport::{Method, Payload, Transport},
};

/// Outgoing chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextChatMessage {
    pub content_type: ChatContentType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_timestamp: Option<String>,
}

impl SendTextChatMessage {
    /// Plain `chat-text` message
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            content_type: ChatContentType::Text,
            message: message.into(),
            extra_data: None,
            sent_timestamp: None,
        }
    }
}

/// Bounds of a chat range query, in server milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatRange {
    pub start: i64,
    pub end: i64,
    pub limit: u32,
}

/// Stateless client for one record tree; every call names its room.
#[derive(Clone)]
pub struct RoomApi {
    base_url: String,
    max_limit: u32,
    transport: Arc<dyn Transport>,
    clock: Arc<ServerClock>,
}

impl RoomApi {
    pub fn new(
        base_url: impl Into<String>,
        max_limit: u32,
        transport: Arc<dyn Transport>,
        clock: Arc<ServerClock>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            max_limit,
            transport,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<ServerClock> {
        &self.clock
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// URL of a resource in a room (`None` for the room root)
    pub fn url(&self, room: &str, resource: Option<&str>) -> String {
        build_url(&self.base_url, room, resource)
    }

    /// Raw call through the transport
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        payload: Payload,
    ) -> Result<Value, SyncError> {
        self.transport.request(method, url, payload).await
    }

    /// PUT `value` to `<kind>!<id>`, letting the server stamp the write.
    ///
    /// Returns the backend's response body. Failures are not retried.
    pub async fn update(
        &self,
        room: &str,
        kind: &str,
        id: &str,
        value: Value,
    ) -> Result<Value, SyncError> {
        let key = format!("{}{}{}", kind, KEY_SEPARATOR, id);
        let body = serde_json::to_value(RecordWrite::new(value))?;
        let url = self.url(room, Some(&key));
        self.request(Method::Put, &url, Payload::Json(body)).await
    }

    /// Write a chat message under a fresh sortable id; returns the record key.
    pub async fn send_text_chat_message(
        &self,
        room: &str,
        message: &SendTextChatMessage,
    ) -> Result<String, SyncError> {
        let id = make_id(self.clock.server_time());
        let value = serde_json::to_value(message)?;
        self.update(room, RecordKind::Chat.as_str(), &id, value)
            .await?;
        Ok(format!("{}{}{}", RecordKind::Chat, KEY_SEPARATOR, id))
    }

    /// Resolve optional bounds against the current server time.
    pub fn chat_range(&self, start: Option<i64>, end: Option<i64>, limit: Option<u32>) -> ChatRange {
        ChatRange {
            start: start.unwrap_or(0),
            end: end.unwrap_or_else(|| self.clock.server_time()),
            limit: limit.unwrap_or(self.max_limit),
        }
    }

    /// Query string selecting chat records in `range`, ordered by key.
    ///
    /// Both bounds are widened by one millisecond so records stamped exactly
    /// at `start` or `end` are included.
    pub fn chat_query(&self, range: ChatRange) -> String {
        let chat = RecordKind::Chat.as_str();
        let start_at = format!("{}{}{}", chat, KEY_SEPARATOR, make_id(range.start.saturating_sub(1)));
        let end_at = format!("{}{}{}", chat, KEY_SEPARATOR, make_id(range.end.saturating_add(1)));
        build_query(&[
            ("orderBy", json_quote("$key")),
            ("limitToLast", range.limit.to_string()),
            ("startAt", json_quote(&start_at)),
            ("endAt", json_quote(&end_at)),
        ])
    }

    /// Fetch chat records between two server timestamps.
    pub async fn request_chat(
        &self,
        room: &str,
        start: Option<i64>,
        end: Option<i64>,
        limit: Option<u32>,
    ) -> Result<RecordMap, SyncError> {
        let range = self.chat_range(start, end, limit);
        let query = self.chat_query(range);
        let response = self
            .request(Method::Get, &self.url(room, None), Payload::Query(query))
            .await?;
        decode_records(response)
    }

    /// Fetch the most recent record by timestamp (empty for an empty room).
    pub async fn request_latest_record(&self, room: &str) -> Result<RecordMap, SyncError> {
        let query = build_query(&[
            ("limitToLast", "1".to_string()),
            ("orderBy", json_quote("timestamp")),
        ]);
        let response = self
            .request(Method::Get, &self.url(room, None), Payload::Query(query))
            .await?;
        decode_records(response)
    }
}

/// `null` is how the backend reports "no records".
fn decode_records(response: Value) -> Result<RecordMap, SyncError> {
    if response.is_null() {
        return Ok(RecordMap::new());
    }
    Ok(serde_json::from_value(response)?)
}
