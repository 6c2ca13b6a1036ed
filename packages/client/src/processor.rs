//! Turns room records into dispatcher actions.

use std::{collections::HashSet, sync::Arc};

use roomsync_shared::time::timestamp_to_iso8601;

use crate::{
    actions::{Action, Dispatcher, ReceivedTextChatMessage},
    clock_sync::ServerClock,
    config::DeliveryMode,
    record::{Record, RecordKey, RecordMap, RecordValue},
};

/// Decodes records by kind and dispatches one action per chat record.
///
/// In [`DeliveryMode::AtLeastOnce`] no per-key state is kept: a chat record
/// delivered by both the history fetch and the live subscription is
/// dispatched twice. [`DeliveryMode::AtMostOnce`] remembers dispatched keys.
pub struct RecordProcessor {
    dispatcher: Arc<dyn Dispatcher>,
    clock: Arc<ServerClock>,
    delivery: DeliveryMode,
    dispatched: HashSet<String>,
}

impl RecordProcessor {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, clock: Arc<ServerClock>, delivery: DeliveryMode) -> Self {
        Self {
            dispatcher,
            clock,
            delivery,
            dispatched: HashSet::new(),
        }
    }

    /// Process a single record; returns whether an action was dispatched.
    ///
    /// Malformed chat values are logged and dropped.
    pub fn process_record(&mut self, key: &str, record: &Record) -> bool {
        let parsed = RecordKey::parse(key);
        let message = match RecordValue::decode(&parsed, record) {
            Ok(RecordValue::Chat(message)) => message,
            Ok(RecordValue::Ignored) => {
                tracing::trace!("Skipping {} record '{}'", parsed.kind, key);
                return false;
            }
            Err(e) => {
                tracing::warn!("Dropping malformed record '{}': {}", key, e);
                return false;
            }
        };

        if self.delivery == DeliveryMode::AtMostOnce && !self.dispatched.insert(key.to_string()) {
            tracing::debug!("Chat record '{}' already dispatched, skipping", key);
            return false;
        }

        let received_timestamp = timestamp_to_iso8601(self.clock.server_time());
        tracing::debug!("Dispatching chat record '{}'", key);
        self.dispatcher
            .dispatch(Action::ReceivedTextChatMessage(ReceivedTextChatMessage {
                content_type: message.content_type,
                message: message.message,
                extra_data: message.extra_data,
                sent_timestamp: message.sent_timestamp,
                received_timestamp,
            }));
        true
    }

    /// Process every record of a mapping; returns the number dispatched.
    pub fn process_records(&mut self, records: &RecordMap) -> usize {
        records
            .iter()
            .filter(|(key, record)| self.process_record(key, record))
            .count()
    }

    /// Forward an arbitrary action to the dispatcher
    pub fn dispatch(&self, action: Action) {
        self.dispatcher.dispatch(action);
    }
}
