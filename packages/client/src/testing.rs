//! In-memory transport for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    error::SyncError,
    transport::{Method, Payload, PushSender, Transport},
};

/// A call seen by [`FakeTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub payload: Payload,
}

impl RecordedRequest {
    /// Last two path segments plus query, e.g. `theRoom/.json?limitToLast=1`
    pub fn room_resource(&self) -> String {
        let path = self.url.rsplitn(3, '/').take(2).collect::<Vec<_>>();
        let mut resource = format!("{}/{}", path[1], path[0]);
        if let Payload::Query(query) = &self.payload {
            resource.push('?');
            resource.push_str(query);
        }
        resource
    }

    /// JSON body of a PUT
    pub fn body(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Json(body) => Some(body),
            _ => None,
        }
    }
}

type Responder = Box<dyn Fn(&RecordedRequest) -> Result<Value, SyncError> + Send + Sync>;

/// Records calls and hands push senders to the test.
pub struct FakeTransport {
    requests: mpsc::UnboundedSender<RecordedRequest>,
    subscriptions: mpsc::UnboundedSender<(String, PushSender)>,
    responder: Responder,
}

/// Test-side end of a [`FakeTransport`]
pub struct FakeRemote {
    requests: mpsc::UnboundedReceiver<RecordedRequest>,
    subscriptions: mpsc::UnboundedReceiver<(String, PushSender)>,
}

impl FakeTransport {
    pub fn new<F>(responder: F) -> (Arc<Self>, FakeRemote)
    where
        F: Fn(&RecordedRequest) -> Result<Value, SyncError> + Send + Sync + 'static,
    {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (subscriptions_tx, subscriptions_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            requests: requests_tx,
            subscriptions: subscriptions_tx,
            responder: Box::new(responder),
        });
        let remote = FakeRemote {
            requests: requests_rx,
            subscriptions: subscriptions_rx,
        };
        (transport, remote)
    }
}

impl FakeRemote {
    pub async fn next_request(&mut self) -> RecordedRequest {
        self.requests.recv().await.expect("transport dropped")
    }

    pub async fn next_subscription(&mut self) -> (String, PushSender) {
        self.subscriptions.recv().await.expect("transport dropped")
    }

    /// Number of subscriptions opened and not yet taken
    pub fn pending_subscriptions(&mut self) -> usize {
        let mut count = 0;
        while self.subscriptions.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    /// Requests recorded so far without waiting
    pub fn drain_requests(&mut self) -> Vec<RecordedRequest> {
        let mut drained = Vec::new();
        while let Ok(request) = self.requests.try_recv() {
            drained.push(request);
        }
        drained
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        payload: Payload,
    ) -> Result<Value, SyncError> {
        let request = RecordedRequest {
            method,
            url: url.to_string(),
            payload,
        };
        let response = (self.responder)(&request);
        let _ = self.requests.send(request);
        response
    }

    async fn subscribe(&self, url: &str, events: PushSender) -> Result<(), SyncError> {
        let _ = self.subscriptions.send((url.to_string(), events.clone()));
        events.closed().await;
        Ok(())
    }
}

/// Answer every call with `null`
pub fn respond_null() -> impl Fn(&RecordedRequest) -> Result<Value, SyncError> + Send + Sync + 'static
{
    |_| Ok(Value::Null)
}

/// Answer the `meta!lastConnect` write with the given server timestamp and
/// everything else with `null`
pub fn respond_server_time(
    server_timestamp: i64,
) -> impl Fn(&RecordedRequest) -> Result<Value, SyncError> + Send + Sync + 'static {
    move |request| {
        if request.method == Method::Put && request.url.ends_with("/meta!lastConnect.json") {
            Ok(serde_json::json!({ "timestamp": server_timestamp }))
        } else {
            Ok(Value::Null)
        }
    }
}
