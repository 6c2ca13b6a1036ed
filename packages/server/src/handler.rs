//! HTTP endpoint handlers.
//!
//! Rooms are addressed as `/<room>/<resource>.json`, where `<resource>` is a
//! record key or empty for the room root.

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    error::ApiError,
    query::RecordQuery,
    store::{Change, RoomStore},
};

const RESOURCE_SUFFIX: &str = ".json";

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Read a record, query the room, or subscribe to the room's changes
pub async fn get_resource(
    State(store): State<Arc<RoomStore>>,
    Path((room, resource)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let key = record_key(&resource)?;

    if key.is_empty() && wants_event_stream(&headers) {
        tracing::info!("Room '{}': event stream subscriber connected", room);
        let (snapshot, changes) = store.subscribe(&room).await;
        return Ok(event_stream(snapshot, changes).into_response());
    }

    if key.is_empty() {
        let query = RecordQuery::parse(&params)?;
        return Ok(Json(store.query(&room, &query).await).into_response());
    }

    Ok(Json(store.read(&room, key).await).into_response())
}

/// Write (or with a `null` body, remove) a record
pub async fn put_resource(
    State(store): State<Arc<RoomStore>>,
    Path((room, resource)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let key = record_key(&resource)?;
    if key.is_empty() {
        return Err(ApiError::BadRequest(
            "writing the room root is not supported".to_string(),
        ));
    }
    Ok(Json(store.write(&room, key, body).await))
}

fn record_key(resource: &str) -> Result<&str, ApiError> {
    resource.strip_suffix(RESOURCE_SUFFIX).ok_or_else(|| {
        ApiError::NotFound(format!("resource '{}' must end with {}", resource, RESOURCE_SUFFIX))
    })
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

/// `put` at `/` with the snapshot, then one `put` per change.
///
/// The stream ends when the subscriber falls too far behind; the client is
/// expected to reconnect and resync.
fn event_stream(
    snapshot: Value,
    changes: broadcast::Receiver<Change>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let initial = Change {
        path: "/".to_string(),
        data: snapshot,
    };
    let initial_stream = stream::once(async move { put_event(&initial) });

    let change_stream = stream::unfold(changes, |mut changes| async move {
        match changes.recv().await {
            Ok(change) => Some((put_event(&change), changes)),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Event stream subscriber lagged by {} changes, closing", skipped);
                None
            }
            Err(RecvError::Closed) => None,
        }
    });

    Sse::new(initial_stream.chain(change_stream)).keep_alive(KeepAlive::default())
}

fn put_event(change: &Change) -> Result<Event, axum::Error> {
    Event::default().event("put").json_data(change)
}
