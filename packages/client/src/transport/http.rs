//! reqwest-backed transport.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{
    Client,
    header::{ACCEPT, CACHE_CONTROL},
};
use serde_json::Value;

use crate::error::SyncError;

use super::{Method, Payload, PushEvent, PushSender, SseDecoder, Transport};

/// Transport speaking HTTP for calls and server-sent events for pushes
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a pre-configured client (proxies, TLS roots, timeouts, ...)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        payload: Payload,
    ) -> Result<Value, SyncError> {
        let builder = match (method, payload) {
            (Method::Get, Payload::Query(query)) => self.client.get(format!("{}?{}", url, query)),
            (Method::Get, _) => self.client.get(url),
            (Method::Put, Payload::Json(body)) => self.client.put(url).json(&body),
            (Method::Put, _) => self.client.put(url),
        };

        tracing::debug!("{} {}", method.as_str(), url);
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!("{} {} failed with {}", method.as_str(), url, status);
            return Err(SyncError::Request {
                status: status.as_u16(),
                response_text: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn subscribe(&self, url: &str, events: PushSender) -> Result<(), SyncError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            return Err(SyncError::Request {
                status: status.as_u16(),
                response_text,
            });
        }

        if events.send(PushEvent::Open).is_err() {
            return Ok(());
        }

        let mut decoder = SseDecoder::new();
        let mut stream = Box::pin(response.bytes_stream());
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SyncError::Connection(e.to_string()))?;
            for frame in decoder.feed(&chunk) {
                let event = PushEvent::Message {
                    event: frame.event,
                    data: frame.data,
                };
                if events.send(event).is_err() {
                    // Nobody is listening any more
                    return Ok(());
                }
            }
        }

        Err(SyncError::Connection("event stream closed".to_string()))
    }
}
