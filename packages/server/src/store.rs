//! In-memory room records and their change feeds.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use roomsync_shared::time::Clock;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast};

use crate::query::RecordQuery;

/// Buffered changes per room before slow subscribers are cut off
const CHANGE_BUFFER: usize = 256;

/// One change to a room, as pushed to subscribers (`put` events)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    /// `/` for the whole room, `/<key>` for one record
    pub path: String,
    /// New value; `null` when removed
    pub data: Value,
}

struct Room {
    records: BTreeMap<String, Value>,
    changes: broadcast::Sender<Change>,
}

impl Room {
    fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            records: BTreeMap::new(),
            changes,
        }
    }

    fn snapshot(&self) -> Value {
        if self.records.is_empty() {
            return Value::Null;
        }
        Value::Object(
            self.records
                .iter()
                .map(|(key, record)| (key.clone(), record.clone()))
                .collect(),
        )
    }
}

/// Every room known to the server, created on first access
pub struct RoomStore {
    clock: Arc<dyn Clock>,
    rooms: Mutex<HashMap<String, Room>>,
}

impl RoomStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Store `body` at `key`, replacing server-value placeholders.
    ///
    /// A `null` body removes the record. Returns the stored value and
    /// notifies the room's subscribers.
    pub async fn write(&self, room: &str, key: &str, body: Value) -> Value {
        let stored = resolve_server_values(body, self.clock.now_millis());

        let mut rooms = self.rooms.lock().await;
        let entry = rooms.entry(room.to_string()).or_insert_with(Room::new);
        if stored.is_null() {
            entry.records.remove(key);
        } else {
            entry.records.insert(key.to_string(), stored.clone());
        }
        tracing::debug!("Room '{}': wrote '{}'", room, key);

        // No subscribers is fine
        let _ = entry.changes.send(Change {
            path: format!("/{}", key),
            data: stored.clone(),
        });
        stored
    }

    /// Value at `key`, `null` when absent
    pub async fn read(&self, room: &str, key: &str) -> Value {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room)
            .and_then(|room| room.records.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Records matching `query`, `null` when none match
    pub async fn query(&self, room: &str, query: &RecordQuery) -> Value {
        let rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(room) else {
            return Value::Null;
        };
        if query.is_empty() {
            return room.snapshot();
        }
        let selected = query.apply(&room.records);
        if selected.is_empty() {
            return Value::Null;
        }
        Value::Object(selected.into_iter().collect::<Map<String, Value>>())
    }

    /// Current room contents plus a feed of every later change.
    ///
    /// Taken under one lock, so no write falls between the two.
    pub async fn subscribe(&self, room: &str) -> (Value, broadcast::Receiver<Change>) {
        let mut rooms = self.rooms.lock().await;
        let entry = rooms.entry(room.to_string()).or_insert_with(Room::new);
        (entry.snapshot(), entry.changes.subscribe())
    }
}

/// Replace every `{".sv": "timestamp"}` object with `now`.
fn resolve_server_values(value: Value, now: i64) -> Value {
    match value {
        Value::Object(map) if is_timestamp_placeholder(&map) => Value::from(now),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, resolve_server_values(value, now)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|value| resolve_server_values(value, now))
                .collect(),
        ),
        other => other,
    }
}

fn is_timestamp_placeholder(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.get(".sv").and_then(Value::as_str) == Some("timestamp")
}
