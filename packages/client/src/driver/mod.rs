//! The sync driver: one room connection, its clock and its dispatcher.
//!
//! [`SyncDriver`] is a cheap handle. The connection state lives in a
//! background task that owns the push subscription and the retry timer, so
//! every state transition happens on a single timeline. Dropping the driver
//! stops the task and closes the subscription.

mod connection;
mod state;

use std::sync::Arc;

use roomsync_shared::time::{Clock, SystemClock};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::{
    actions::{Dispatcher, FetchServerData, SetupWindowData, WindowType},
    api::{RoomApi, SendTextChatMessage},
    backoff::Backoff,
    clock_sync::ServerClock,
    config::DriverConfig,
    error::SyncError,
    id,
    processor::RecordProcessor,
    record::RecordMap,
    transport::{HttpTransport, Method, Payload, Transport},
};

use connection::{Command, ConnectionTask};
pub use state::{ConnectionPhase, ConnectionStatus};

/// Builder for [`SyncDriver`]; the dispatcher is mandatory.
pub struct SyncDriverBuilder {
    config: DriverConfig,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SyncDriverBuilder {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            dispatcher: None,
            transport: None,
            clock: None,
        }
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Defaults to [`HttpTransport`]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Defaults to [`SystemClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and start the connection task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<SyncDriver, SyncError> {
        let dispatcher = self
            .dispatcher
            .ok_or_else(|| SyncError::Configuration("dispatcher is required".to_string()))?;
        let config = self.config.validate()?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));
        let clock = Arc::new(ServerClock::new(
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        ));

        let api = RoomApi::new(
            config.base_url.clone(),
            config.max_limit,
            transport,
            clock.clone(),
        );
        let processor = RecordProcessor::new(dispatcher, clock, config.delivery);
        let backoff = Backoff::new(config.initial_retry_timeout, config.max_retry_timeout);
        let status = Arc::new(watch::Sender::new(ConnectionStatus {
            retry_timeout: backoff.retry_timeout(),
            ..ConnectionStatus::default()
        }));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let task = ConnectionTask::new(
            api.clone(),
            processor,
            backoff,
            config.history_window,
            status.clone(),
            commands_rx,
        );
        tokio::spawn(task.run());
        tracing::debug!("Sync driver started for {}", config.base_url);

        Ok(SyncDriver {
            api,
            commands: commands_tx,
            status,
        })
    }
}

/// Handle to a running sync driver
pub struct SyncDriver {
    api: RoomApi,
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<watch::Sender<ConnectionStatus>>,
}

impl SyncDriver {
    pub fn builder(config: DriverConfig) -> SyncDriverBuilder {
        SyncDriverBuilder::new(config)
    }

    /// Connect to a room, superseding any current connection or pending retry.
    pub fn connect_to_room(&self, room_token: impl Into<String>) -> Result<(), SyncError> {
        let room_token = room_token.into();
        self.status
            .send_modify(|status| status.room_token = Some(room_token.clone()));
        self.send_command(Command::Connect(room_token))
    }

    /// Connect to the room named by the window data, if any.
    pub fn setup_window_data(&self, action: &SetupWindowData) -> Result<(), SyncError> {
        match &action.room_token {
            Some(room_token) => self.connect_to_room(room_token.clone()),
            None => {
                tracing::debug!("Window data without a room token, not connecting");
                Ok(())
            }
        }
    }

    /// Connect to the token's room; only room windows hold a connection.
    pub fn fetch_server_data(&self, action: &FetchServerData) -> Result<(), SyncError> {
        if action.window_type != WindowType::Room {
            tracing::debug!("Ignoring server data fetch for {:?} window", action.window_type);
            return Ok(());
        }
        self.connect_to_room(action.token.clone())
    }

    /// Close the subscription and cancel any pending retry.
    pub fn disconnect(&self) -> Result<(), SyncError> {
        self.status.send_modify(|status| status.room_token = None);
        self.send_command(Command::Disconnect)
    }

    pub fn server_time(&self) -> i64 {
        self.api.clock().server_time()
    }

    pub fn server_time_at(&self, local_ms: i64) -> i64 {
        self.api.clock().server_time_at(local_ms)
    }

    /// Sortable id for the current server time
    pub fn make_id(&self) -> String {
        id::make_id(self.server_time())
    }

    /// Sortable id for an explicit timestamp
    pub fn make_id_at(&self, timestamp_ms: i64) -> String {
        id::make_id(timestamp_ms)
    }

    /// Fetch chat records of the current room between two server timestamps.
    ///
    /// `start` defaults to 0, `end` to the current server time and `limit` to
    /// the configured maximum.
    pub async fn request_chat(
        &self,
        start: Option<i64>,
        end: Option<i64>,
        limit: Option<u32>,
    ) -> Result<RecordMap, SyncError> {
        let room = self.room_token()?;
        self.api.request_chat(&room, start, end, limit).await
    }

    /// Write `value` to `<kind>!<id>` in the current room.
    pub async fn update<V: Serialize>(
        &self,
        kind: &str,
        id: &str,
        value: V,
    ) -> Result<Value, SyncError> {
        let room = self.room_token()?;
        let value = serde_json::to_value(value)?;
        self.api.update(&room, kind, id, value).await
    }

    /// Send a chat message to the current room; returns its record key.
    pub async fn send_text_chat_message(
        &self,
        message: &SendTextChatMessage,
    ) -> Result<String, SyncError> {
        let room = self.room_token()?;
        self.api.send_text_chat_message(&room, message).await
    }

    /// Raw call through the driver's transport
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        payload: Payload,
    ) -> Result<Value, SyncError> {
        self.api.request(method, url, payload).await
    }

    /// URL of a resource in the current room (`None` for the room root)
    pub fn build_url(&self, resource: Option<&str>) -> Result<String, SyncError> {
        let room = self.room_token()?;
        Ok(self.api.url(&room, resource))
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Watch connection status changes
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Offset to server time in milliseconds
    pub fn clock_skew(&self) -> i64 {
        self.api.clock().skew()
    }

    /// Delay of the most recently scheduled reconnect
    pub fn retry_timeout(&self) -> std::time::Duration {
        self.status.borrow().retry_timeout
    }

    fn room_token(&self) -> Result<String, SyncError> {
        self.status
            .borrow()
            .room_token
            .clone()
            .ok_or(SyncError::NoActiveRoom)
    }

    fn send_command(&self, command: Command) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::Connection("connection task stopped".to_string()))
    }
}
