//! Room records and their typed values.
//!
//! Every entry in a room lives at a key of the form `<kind>!<id>` and holds a
//! `{ timestamp, value }` pair, where `timestamp` is assigned by the server.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between the record kind and its id
pub const KEY_SEPARATOR: char = '!';

/// Kind tag of a record key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Write-once chat messages, `chat!<sortable id>`
    Chat,
    /// Driver bookkeeping such as `meta!lastConnect`
    Meta,
    /// Anything this driver does not understand
    Other(String),
}

impl RecordKind {
    pub fn as_str(&self) -> &str {
        match self {
            RecordKind::Chat => "chat",
            RecordKind::Meta => "meta",
            RecordKind::Other(kind) => kind,
        }
    }
}

impl From<&str> for RecordKind {
    fn from(s: &str) -> Self {
        match s {
            "chat" => RecordKind::Chat,
            "meta" => RecordKind::Meta,
            other => RecordKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `<kind>!<id>` key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub id: String,
}

impl RecordKey {
    pub fn new(kind: RecordKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Split a raw key at the first separator.
    ///
    /// A key without a separator is treated as a bare kind with an empty id.
    pub fn parse(raw: &str) -> Self {
        let (kind, id) = raw.split_once(KEY_SEPARATOR).unwrap_or((raw, ""));
        Self::new(RecordKind::from(kind), id)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind, KEY_SEPARATOR, self.id)
    }
}

/// Well-known key holding the server time of the latest connect
pub fn last_connect_key() -> RecordKey {
    RecordKey::new(RecordKind::Meta, "lastConnect")
}

/// A `{ timestamp, value }` entry as stored by the backend
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub value: Value,
}

/// Keyed records as returned by range queries and bulk snapshots
pub type RecordMap = BTreeMap<String, Record>;

/// Placeholder the backend replaces with its own wall-clock time on write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTimestamp {
    #[serde(rename = ".sv")]
    sv: ServerValueKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ServerValueKind {
    Timestamp,
}

impl ServerTimestamp {
    pub const SENTINEL: ServerTimestamp = ServerTimestamp {
        sv: ServerValueKind::Timestamp,
    };
}

/// Body of every PUT: `{"timestamp":{".sv":"timestamp"},"value":<value>}`
#[derive(Debug, Clone, Serialize)]
pub struct RecordWrite<V> {
    pub timestamp: ServerTimestamp,
    pub value: V,
}

impl<V: Serialize> RecordWrite<V> {
    pub fn new(value: V) -> Self {
        Self {
            timestamp: ServerTimestamp::SENTINEL,
            value,
        }
    }
}

/// Content type of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatContentType {
    #[serde(rename = "chat-text")]
    Text,
    #[serde(rename = "chat-context")]
    Context,
    #[serde(rename = "chat-notification")]
    Notification,
    #[serde(rename = "room-name")]
    RoomName,
    #[serde(rename = "context-tile")]
    ContextTile,
}

impl ChatContentType {
    /// Wire name, e.g. `chat-text`
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatContentType::Text => "chat-text",
            ChatContentType::Context => "chat-context",
            ChatContentType::Notification => "chat-notification",
            ChatContentType::RoomName => "room-name",
            ChatContentType::ContextTile => "context-tile",
        }
    }
}

/// Value of a `chat!` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub content_type: ChatContentType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_timestamp: Option<String>,
}

/// Record values this driver knows how to interpret
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Chat(ChatMessage),
    /// Bookkeeping and unknown kinds; never dispatched
    Ignored,
}

impl RecordValue {
    /// Decode a record's value according to the kind tag of its key.
    pub fn decode(key: &RecordKey, record: &Record) -> Result<Self, serde_json::Error> {
        match key.kind {
            RecordKind::Chat => {
                ChatMessage::deserialize(&record.value).map(RecordValue::Chat)
            }
            RecordKind::Meta | RecordKind::Other(_) => Ok(RecordValue::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_chat_key() {
        // テスト項目: chat キーが種別と ID に分解される
        // given (前提条件):
        let raw = "chat!01234567abcdefghijkl";

        // when (操作):
        let key = RecordKey::parse(raw);

        // then (期待する結果):
        assert_eq!(key.kind, RecordKind::Chat);
        assert_eq!(key.id, "01234567abcdefghijkl");
        assert_eq!(key.to_string(), raw);
    }

    #[test]
    fn test_parse_unknown_kind() {
        // テスト項目: 未知の種別は Other として保持される
        // given (前提条件):
        let raw = "theType!theId";

        // when (操作):
        let key = RecordKey::parse(raw);

        // then (期待する結果):
        assert_eq!(key.kind, RecordKind::Other("theType".to_string()));
        assert_eq!(key.to_string(), "theType!theId");
    }

    #[test]
    fn test_parse_key_without_separator() {
        // テスト項目: 区切り文字が無いキーは全体が種別になる
        // given (前提条件):
        let raw = "orphan";

        // when (操作):
        let key = RecordKey::parse(raw);

        // then (期待する結果):
        assert_eq!(key.kind, RecordKind::Other("orphan".to_string()));
        assert_eq!(key.id, "");
    }

    #[test]
    fn test_record_write_body_matches_wire_format() {
        // テスト項目: 書き込み本文にサーバータイムスタンプの sentinel が入る
        // given (前提条件):
        let write = RecordWrite::new(json!({"contentType": "chat-text", "message": "Are you there?"}));

        // when (操作):
        let body = serde_json::to_string(&write).unwrap();

        // then (期待する結果):
        assert_eq!(
            body,
            r#"{"timestamp":{".sv":"timestamp"},"value":{"contentType":"chat-text","message":"Are you there?"}}"#
        );
    }

    #[test]
    fn test_decode_chat_value() {
        // テスト項目: chat レコードの value が ChatMessage にデコードされる
        // given (前提条件):
        let key = RecordKey::parse("chat!01234567abcdefghijkl");
        let record: Record = serde_json::from_value(json!({
            "timestamp": 1234567890123_i64,
            "value": {
                "contentType": "chat-text",
                "message": "Are you there?",
                "sentTimestamp": "2016-05-10T18:26:58.235Z"
            }
        }))
        .unwrap();

        // when (操作):
        let value = RecordValue::decode(&key, &record).unwrap();

        // then (期待する結果):
        assert_eq!(
            value,
            RecordValue::Chat(ChatMessage {
                content_type: ChatContentType::Text,
                message: "Are you there?".to_string(),
                extra_data: None,
                sent_timestamp: Some("2016-05-10T18:26:58.235Z".to_string()),
            })
        );
    }

    #[test]
    fn test_decode_meta_is_ignored() {
        // テスト項目: meta レコードは値に関係なく Ignored になる
        // given (前提条件):
        let key = last_connect_key();
        let record: Record = serde_json::from_value(json!({"timestamp": 2345678901234_i64})).unwrap();

        // when (操作):
        let value = RecordValue::decode(&key, &record).unwrap();

        // then (期待する結果):
        assert_eq!(value, RecordValue::Ignored);
        assert_eq!(record.value, Value::Null);
    }

    #[test]
    fn test_decode_malformed_chat_fails() {
        // テスト項目: 形式が不正な chat レコードはデコードエラーになる
        // given (前提条件):
        let key = RecordKey::parse("chat!abc");
        let record = Record {
            timestamp: 1,
            value: json!({"message": 42}),
        };

        // when (操作):
        let result = RecordValue::decode(&key, &record);

        // then (期待する結果):
        assert!(result.is_err());
    }
}
