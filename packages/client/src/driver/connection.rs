//! Connection task: owns the connection state and runs the reconnect state
//! machine on a single timeline.
//!
//! Commands from the [`SyncDriver`](super::SyncDriver) handle, push events
//! from the current subscription, bootstrap results and the retry timer are
//! all handled here, one at a time.

use std::{collections::HashMap, pin::Pin, sync::Arc, time::Duration};

use serde_json::Value;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Sleep,
};

use crate::{
    actions::{Action, DataChannelsAvailable},
    api::{ChatRange, RoomApi},
    backoff::Backoff,
    error::SyncError,
    processor::RecordProcessor,
    push::{PushUpdate, decode_push},
    record::{Record, RecordMap, last_connect_key},
    transport::PushEvent,
};

use super::state::{ConnectionPhase, ConnectionStatus};

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Requests from the driver handle
#[derive(Debug)]
pub(crate) enum Command {
    Connect(String),
    Disconnect,
}

/// Results of work spawned for one connection attempt
#[derive(Debug)]
enum AttemptEvent {
    LatestRecord(Result<RecordMap, SyncError>),
    ClockSynced {
        server_timestamp: i64,
        local_at_completion: i64,
    },
    History(RecordMap),
}

/// Window of chat history to request once the clock is synced.
///
/// Starts at the previous connect to the same room, but never further back
/// than `history_window`. The limit is one per elapsed hour (at least one),
/// plus one for a message landing exactly on an hour boundary.
pub(crate) fn history_range(
    server_time: i64,
    previous_connect: Option<i64>,
    history_window: Duration,
) -> ChatRange {
    let window_ms = i64::try_from(history_window.as_millis()).unwrap_or(i64::MAX);
    let start = previous_connect
        .unwrap_or(0)
        .max(server_time.saturating_sub(window_ms))
        .max(0);
    let elapsed = server_time.saturating_sub(start).max(0);
    let hours = ((elapsed + HOUR_MS - 1) / HOUR_MS).max(1);
    ChatRange {
        start,
        end: server_time,
        limit: u32::try_from(hours + 1).unwrap_or(u32::MAX),
    }
}

pub(crate) struct ConnectionTask {
    api: RoomApi,
    processor: RecordProcessor,
    backoff: Backoff,
    history_window: Duration,
    status: Arc<watch::Sender<ConnectionStatus>>,
    commands: mpsc::UnboundedReceiver<Command>,
    attempt_tx: mpsc::UnboundedSender<(u64, AttemptEvent)>,
    attempt_rx: mpsc::UnboundedReceiver<(u64, AttemptEvent)>,
    /// Incremented per connection attempt; stale attempt results are dropped
    generation: u64,
    room_token: Option<String>,
    push_rx: Option<mpsc::UnboundedReceiver<PushEvent>>,
    subscription: Option<JoinHandle<()>>,
    attempt_tasks: Vec<JoinHandle<()>>,
    retry: Option<Pin<Box<Sleep>>>,
    /// The next `put /` is the subscription's initial snapshot
    awaiting_snapshot: bool,
    /// Server time of the last successful clock sync, per room
    previous_connects: HashMap<String, i64>,
}

impl ConnectionTask {
    pub(crate) fn new(
        api: RoomApi,
        processor: RecordProcessor,
        backoff: Backoff,
        history_window: Duration,
        status: Arc<watch::Sender<ConnectionStatus>>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        Self {
            api,
            processor,
            backoff,
            history_window,
            status,
            commands,
            attempt_tx,
            attempt_rx,
            generation: 0,
            room_token: None,
            push_rx: None,
            subscription: None,
            attempt_tasks: Vec::new(),
            retry: None,
            awaiting_snapshot: true,
            previous_connects: HashMap::new(),
        }
    }

    /// Run until the driver handle goes away.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Connect(room)) => {
                        self.backoff.reset();
                        self.connect(room);
                    }
                    Some(Command::Disconnect) => self.close(),
                    None => {
                        self.close();
                        break;
                    }
                },
                Some((generation, event)) = self.attempt_rx.recv() => {
                    if generation == self.generation {
                        self.handle_attempt_event(event);
                    }
                }
                event = next_push(&mut self.push_rx) => match event {
                    Some(event) => self.handle_push_event(event),
                    None => self.push_rx = None,
                },
                () = retry_elapsed(&mut self.retry) => {
                    self.retry = None;
                    self.reconnect();
                }
            }
        }
        tracing::debug!("Connection task stopped");
    }

    /// Start a connection attempt, superseding any previous one.
    fn connect(&mut self, room: String) {
        self.teardown();
        self.generation += 1;
        self.awaiting_snapshot = true;
        self.api.clock().reset();
        self.room_token = Some(room.clone());
        self.status.send_modify(|status| {
            status.phase = ConnectionPhase::Connecting;
            status.clock_skew = None;
            status.room_empty = None;
        });
        tracing::info!("Connecting to room '{}' (attempt {})", room, self.generation);

        self.open_subscription(&room);
        self.start_bootstrap(room);
    }

    /// Replay the connect sequence for the current room after a backoff.
    fn reconnect(&mut self) {
        match self.room_token.clone() {
            Some(room) => {
                tracing::info!("Reconnecting to room '{}'", room);
                self.connect(room);
            }
            None => tracing::debug!("Retry fired without a room, ignoring"),
        }
    }

    fn open_subscription(&mut self, room: &str) {
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let transport = self.api.transport().clone();
        let url = self.api.url(room, None);

        self.push_rx = Some(push_rx);
        self.subscription = Some(tokio::spawn(async move {
            let reason = match transport.subscribe(&url, push_tx.clone()).await {
                Ok(()) => "push subscription ended".to_string(),
                Err(e) => e.to_string(),
            };
            let _ = push_tx.send(PushEvent::Error(reason));
        }));
    }

    /// Probe for the latest record and sync the clock via `meta!lastConnect`.
    fn start_bootstrap(&mut self, room: String) {
        let api = self.api.clone();
        let events = self.attempt_tx.clone();
        let generation = self.generation;

        self.attempt_tasks.push(tokio::spawn(async move {
            let latest = async {
                let result = api.request_latest_record(&room).await;
                let _ = events.send((generation, AttemptEvent::LatestRecord(result)));
            };
            let clock_sync = async {
                let key = last_connect_key();
                let kind = key.kind.to_string();
                match api.update(&room, &kind, &key.id, Value::Null).await {
                    Ok(response) => {
                        let local_at_completion = api.clock().local_now();
                        match serde_json::from_value::<Record>(response) {
                            Ok(record) => {
                                let _ = events.send((
                                    generation,
                                    AttemptEvent::ClockSynced {
                                        server_timestamp: record.timestamp,
                                        local_at_completion,
                                    },
                                ));
                            }
                            Err(e) => tracing::warn!("Unreadable lastConnect response: {}", e),
                        }
                    }
                    Err(e) => tracing::warn!("Failed to update lastConnect: {}", e),
                }
            };
            tokio::join!(latest, clock_sync);
        }));
    }

    fn handle_attempt_event(&mut self, event: AttemptEvent) {
        match event {
            AttemptEvent::LatestRecord(Ok(records)) => {
                let empty = records.is_empty();
                tracing::debug!("Room is {}", if empty { "empty" } else { "not empty" });
                self.status
                    .send_modify(|status| status.room_empty = Some(empty));
            }
            AttemptEvent::LatestRecord(Err(e)) => {
                tracing::warn!("Failed to probe for the latest record: {}", e);
            }
            AttemptEvent::ClockSynced {
                server_timestamp,
                local_at_completion,
            } => self.on_clock_synced(server_timestamp, local_at_completion),
            AttemptEvent::History(records) => {
                let dispatched = self.processor.process_records(&records);
                tracing::info!(
                    "Fetched {} history records, dispatched {}",
                    records.len(),
                    dispatched
                );
            }
        }
    }

    fn on_clock_synced(&mut self, server_timestamp: i64, local_at_completion: i64) {
        let skew = self
            .api
            .clock()
            .apply_sync(server_timestamp, local_at_completion);
        self.status
            .send_modify(|status| status.clock_skew = Some(skew));

        let Some(room) = self.room_token.clone() else {
            return;
        };
        let previous_connect = self.previous_connects.insert(room.clone(), server_timestamp);
        let range = history_range(server_timestamp, previous_connect, self.history_window);

        let api = self.api.clone();
        let events = self.attempt_tx.clone();
        let generation = self.generation;
        tracing::debug!(
            "Requesting chat history from {} to {} (limit {})",
            range.start,
            range.end,
            range.limit
        );
        self.attempt_tasks.push(tokio::spawn(async move {
            match api
                .request_chat(&room, Some(range.start), Some(range.end), Some(range.limit))
                .await
            {
                Ok(records) => {
                    let _ = events.send((generation, AttemptEvent::History(records)));
                }
                Err(e) => tracing::warn!("Failed to fetch chat history: {}", e),
            }
        }));
    }

    fn handle_push_event(&mut self, event: PushEvent) {
        match event {
            PushEvent::Open => self.on_open(),
            PushEvent::Message { event, data } => self.on_message(&event, &data),
            PushEvent::Error(reason) => self.on_subscription_error(&reason),
        }
    }

    fn on_open(&mut self) {
        tracing::info!("Push subscription open");
        self.backoff.on_open();
        self.status
            .send_modify(|status| status.phase = ConnectionPhase::Open);
        self.processor
            .dispatch(Action::DataChannelsAvailable(DataChannelsAvailable {
                available: true,
            }));
    }

    fn on_message(&mut self, event: &str, data: &str) {
        let update = match decode_push(event, data) {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!("Dropping malformed '{}' push event: {}", event, e);
                return;
            }
        };

        match update {
            PushUpdate::Root(records) => {
                if self.awaiting_snapshot {
                    self.awaiting_snapshot = false;
                    tracing::debug!(
                        "Initial snapshot of {} records, covered by history fetch",
                        records.len()
                    );
                } else {
                    self.processor.process_records(&records);
                }
            }
            PushUpdate::Batch(records) => {
                self.processor.process_records(&records);
            }
            PushUpdate::Record { key, record } => {
                self.processor.process_record(&key, &record);
            }
            PushUpdate::Removed { key } => tracing::debug!("Record '{}' removed", key),
            PushUpdate::Partial { path } => {
                tracing::debug!("Ignoring partial update at '{}'", path)
            }
            PushUpdate::KeepAlive => tracing::trace!("keep-alive"),
            PushUpdate::Revoked { reason } => self.on_subscription_error(&reason),
            PushUpdate::Unknown { event } => {
                tracing::debug!("Ignoring unknown push event '{}'", event)
            }
        }
    }

    fn on_subscription_error(&mut self, reason: &str) {
        if self.room_token.is_none() {
            return;
        }
        self.teardown();
        let delay = self.backoff.on_error();
        tracing::warn!(
            "Push subscription failed ({}), reconnecting in {:?}",
            reason,
            delay
        );
        self.status.send_modify(|status| {
            status.phase = ConnectionPhase::Backoff;
            status.retry_timeout = delay;
        });
        self.retry = Some(Box::pin(tokio::time::sleep(delay)));
    }

    fn close(&mut self) {
        self.teardown();
        self.generation += 1;
        self.room_token = None;
        self.backoff.reset();
        self.api.clock().reset();
        let retry_timeout = self.backoff.retry_timeout();
        self.status.send_modify(|status| {
            status.phase = ConnectionPhase::Closed;
            status.clock_skew = None;
            status.room_empty = None;
            status.retry_timeout = retry_timeout;
        });
    }

    /// Stop the subscription, pending attempt work and any scheduled retry.
    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
        }
        for task in self.attempt_tasks.drain(..) {
            task.abort();
        }
        self.push_rx = None;
        self.retry = None;
    }
}

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn next_push(push_rx: &mut Option<mpsc::UnboundedReceiver<PushEvent>>) -> Option<PushEvent> {
    match push_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);
    const DAY_MS: i64 = 24 * HOUR_MS;

    #[test]
    fn test_history_range_first_connect_over_a_day() {
        // テスト項目: 初回接続でサーバー時刻が 1 日 +1ms の場合、直近 1 日分を 25 件要求する
        // given (前提条件):
        let server_time = DAY_MS + 1;

        // when (操作):
        let range = history_range(server_time, None, DAY);

        // then (期待する結果):
        assert_eq!(
            range,
            ChatRange {
                start: 1,
                end: server_time,
                limit: 25
            }
        );
    }

    #[test]
    fn test_history_range_recent_previous_connect() {
        // テスト項目: 前回接続が 90 分前なら前回接続時刻から 3 件要求する
        // given (前提条件):
        let server_time = 10 * DAY_MS;
        let previous = server_time - 90 * 60 * 1000;

        // when (操作):
        let range = history_range(server_time, Some(previous), DAY);

        // then (期待する結果):
        assert_eq!(range.start, previous);
        assert_eq!(range.limit, 3);
    }

    #[test]
    fn test_history_range_clamps_old_previous_connect() {
        // テスト項目: 前回接続が窓より古い場合は窓の長さに制限される
        // given (前提条件):
        let server_time = 10 * DAY_MS;
        let previous = server_time - 3 * DAY_MS;

        // when (操作):
        let range = history_range(server_time, Some(previous), DAY);

        // then (期待する結果):
        assert_eq!(range.start, server_time - DAY_MS);
        assert_eq!(range.limit, 25);
    }

    #[test]
    fn test_history_range_configurable_window() {
        // テスト項目: 窓の長さは設定値に従い、最低 1 時間分 +1 件を要求する
        // given (前提条件):
        let server_time = 10 * DAY_MS;
        let week = Duration::from_secs(7 * 24 * 60 * 60);

        // when (操作):
        let week_range = history_range(server_time, None, week);
        let immediate = history_range(server_time, Some(server_time), week);

        // then (期待する結果):
        assert_eq!(week_range.start, server_time - 7 * DAY_MS);
        assert_eq!(week_range.limit, 7 * 24 + 1);
        assert_eq!(immediate.limit, 2);
    }

    #[test]
    fn test_history_range_early_server_time() {
        // テスト項目: サーバー時刻が窓より小さい場合は 0 から要求する
        // given (前提条件):
        let server_time = 1234;

        // when (操作):
        let range = history_range(server_time, None, DAY);

        // then (期待する結果):
        assert_eq!(range.start, 0);
        assert_eq!(range.limit, 2);
    }
}
