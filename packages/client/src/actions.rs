//! Actions exchanged with the application dispatcher.
//!
//! The driver consumes [`SetupWindowData`] and [`FetchServerData`] and emits
//! [`DataChannelsAvailable`] and [`ReceivedTextChatMessage`]. Nothing else
//! about the dispatcher is observed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::record::ChatContentType;

/// Kind of window a room action originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Room,
    Conversation,
    Panel,
}

/// Window data is available; carries the room to connect to, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupWindowData {
    pub window_id: Option<String>,
    pub window_type: Option<WindowType>,
    pub room_token: Option<String>,
}

/// Request to fetch server data for a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchServerData {
    pub token: String,
    pub window_type: WindowType,
}

/// The push channel opened (or closed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataChannelsAvailable {
    pub available: bool,
}

/// A chat record arrived from the room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedTextChatMessage {
    pub content_type: ChatContentType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Value>,
    /// Sender-supplied timestamp, passed through unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_timestamp: Option<String>,
    /// Server-corrected time at which the record was processed
    pub received_timestamp: String,
}

/// Everything the driver can send to or receive from the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum Action {
    SetupWindowData(SetupWindowData),
    FetchServerData(FetchServerData),
    DataChannelsAvailable(DataChannelsAvailable),
    ReceivedTextChatMessage(ReceivedTextChatMessage),
}

/// Sink for driver events.
///
/// The driver only ever calls `dispatch`; it never reads dispatcher state.
#[cfg_attr(test, mockall::automock)]
pub trait Dispatcher: Send + Sync {
    /// Deliver one action to the application
    fn dispatch(&self, action: Action);
}

impl Dispatcher for mpsc::UnboundedSender<Action> {
    fn dispatch(&self, action: Action) {
        if self.send(action).is_err() {
            tracing::debug!("Dispatcher channel closed, dropping action");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_dispatcher_forwards_actions() {
        // テスト項目: mpsc の Sender を Dispatcher として使うとアクションが転送される
        // given (前提条件):
        let (tx, mut rx) = mpsc::unbounded_channel();
        let action = Action::DataChannelsAvailable(DataChannelsAvailable { available: true });

        // when (操作):
        tx.dispatch(action.clone());

        // then (期待する結果):
        assert_eq!(rx.try_recv().ok(), Some(action));
    }

    #[test]
    fn test_channel_dispatcher_ignores_closed_channel() {
        // テスト項目: 受信側が閉じていてもパニックしない
        // given (前提条件):
        let (tx, rx) = mpsc::unbounded_channel::<Action>();
        drop(rx);

        // when (操作):
        tx.dispatch(Action::DataChannelsAvailable(DataChannelsAvailable {
            available: false,
        }));

        // then (期待する結果):
        assert!(tx.is_closed());
    }

    #[test]
    fn test_received_message_serializes_camel_case() {
        // テスト項目: 受信メッセージが camelCase でシリアライズされる
        // given (前提条件):
        let action = ReceivedTextChatMessage {
            content_type: ChatContentType::Text,
            message: "Are you there?".to_string(),
            extra_data: None,
            sent_timestamp: Some("2016-05-10T18:26:58.235Z".to_string()),
            received_timestamp: "2009-02-13T23:31:30.123Z".to_string(),
        };

        // when (操作):
        let json = serde_json::to_value(&action).unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            serde_json::json!({
                "contentType": "chat-text",
                "message": "Are you there?",
                "sentTimestamp": "2016-05-10T18:26:58.235Z",
                "receivedTimestamp": "2009-02-13T23:31:30.123Z"
            })
        );
    }
}
