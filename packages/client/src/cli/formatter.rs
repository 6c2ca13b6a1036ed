//! Message formatting utilities for client display.

use chrono::{DateTime, Local};

use crate::actions::ReceivedTextChatMessage;

const RULE: &str = "------------------------------------------------------------";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a received chat message
    ///
    /// Shows the sender's timestamp when present, otherwise the time the
    /// message was received.
    pub fn format_chat_message(message: &ReceivedTextChatMessage) -> String {
        let (label, timestamp) = match &message.sent_timestamp {
            Some(sent) => ("sent at", sent.as_str()),
            None => ("received at", message.received_timestamp.as_str()),
        };
        format!(
            "\n\n{}\n[{}] {}\n{} {}\n{}\n",
            RULE,
            message.content_type.as_str(),
            message.message,
            label,
            Self::format_timestamp(timestamp),
            RULE
        )
    }

    /// Format a channel availability change
    pub fn format_channel_status(available: bool) -> String {
        if available {
            "\n* connected to room\n".to_string()
        } else {
            "\n* disconnected from room\n".to_string()
        }
    }

    /// Format a confirmation message after sending
    pub fn format_sent_confirmation(key: &str, sent_timestamp: &str) -> String {
        format!("sent {} at {}\n", key, Self::format_timestamp(sent_timestamp))
    }

    /// Render an ISO-8601 timestamp in local time; unparsable input is shown as is.
    pub fn format_timestamp(timestamp: &str) -> String {
        match DateTime::parse_from_rfc3339(timestamp) {
            Ok(parsed) => parsed
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S%.3f")
                .to_string(),
            Err(_) => timestamp.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ChatContentType;

    fn create_message(sent_timestamp: Option<&str>) -> ReceivedTextChatMessage {
        ReceivedTextChatMessage {
            content_type: ChatContentType::Text,
            message: "Hello, world!".to_string(),
            extra_data: None,
            sent_timestamp: sent_timestamp.map(str::to_string),
            received_timestamp: "2023-01-01T12:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_format_chat_message_with_sent_timestamp() {
        // テスト項目: 送信時刻がある場合は送信時刻を表示する
        // given (前提条件):
        let message = create_message(Some("2023-01-01T12:00:00.000Z"));

        // when (操作):
        let result = MessageFormatter::format_chat_message(&message);

        // then (期待する結果):
        assert!(result.contains("[chat-text] Hello, world!"));
        assert!(result.contains("sent at 2023-01-0"));
        assert!(result.contains(RULE));
    }

    #[test]
    fn test_format_chat_message_without_sent_timestamp() {
        // テスト項目: 送信時刻がない場合は受信時刻を表示する
        // given (前提条件):
        let message = create_message(None);

        // when (操作):
        let result = MessageFormatter::format_chat_message(&message);

        // then (期待する結果):
        assert!(result.contains("received at 2023-01-0"));
    }

    #[test]
    fn test_format_channel_status() {
        // テスト項目: 接続状態の通知が正しくフォーマットされる
        // given (前提条件):

        // when (操作):
        let up = MessageFormatter::format_channel_status(true);
        let down = MessageFormatter::format_channel_status(false);

        // then (期待する結果):
        assert!(up.contains("connected to room"));
        assert!(down.contains("disconnected from room"));
    }

    #[test]
    fn test_format_timestamp_passes_through_invalid_input() {
        // テスト項目: 解析できないタイムスタンプはそのまま表示される
        // given (前提条件):
        let timestamp = "yesterday";

        // when (操作):
        let result = MessageFormatter::format_timestamp(timestamp);

        // then (期待する結果):
        assert_eq!(result, "yesterday");
    }

    #[test]
    fn test_format_sent_confirmation() {
        // テスト項目: 送信確認メッセージにキーが含まれる
        // given (前提条件):
        let key = "chat!0019aWBIabcdefghijkl";

        // when (操作):
        let result = MessageFormatter::format_sent_confirmation(key, "2023-01-01T12:00:00.000Z");

        // then (期待する結果):
        assert!(result.starts_with("sent chat!0019aWBIabcdefghijkl at 2023-01-0"));
    }
}
