//! Interpretation of push subscription messages.

use serde::Deserialize;
use serde_json::Value;

use crate::record::{Record, RecordMap};

/// `data` field of `put` and `patch` events
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushPayload {
    pub path: String,
    #[serde(default)]
    pub data: Value,
}

/// What a push message means for the room
#[derive(Debug, Clone, PartialEq)]
pub enum PushUpdate {
    /// The whole room (`put` at `/`)
    Root(RecordMap),
    /// Several records at once (`patch` at `/`)
    Batch(RecordMap),
    /// One record (`put` at `/<key>`)
    Record { key: String, record: Record },
    /// A record was removed
    Removed { key: String },
    /// A change below record level, e.g. `/<key>/value`
    Partial { path: String },
    /// Heartbeat
    KeepAlive,
    /// The server ended the subscription (`cancel`, `auth_revoked`)
    Revoked { reason: String },
    /// Event kind this driver does not handle
    Unknown { event: String },
}

/// Decode a named push message.
pub fn decode_push(event: &str, data: &str) -> Result<PushUpdate, serde_json::Error> {
    match event {
        "put" => {
            let payload: PushPayload = serde_json::from_str(data)?;
            decode_put(payload)
        }
        "patch" => {
            let payload: PushPayload = serde_json::from_str(data)?;
            decode_patch(payload)
        }
        "keep-alive" => Ok(PushUpdate::KeepAlive),
        "cancel" | "auth_revoked" => Ok(PushUpdate::Revoked {
            reason: format!("{}: {}", event, data),
        }),
        other => Ok(PushUpdate::Unknown {
            event: other.to_string(),
        }),
    }
}

fn decode_put(payload: PushPayload) -> Result<PushUpdate, serde_json::Error> {
    let path = payload.path.trim_start_matches('/');
    if path.is_empty() {
        let records = if payload.data.is_null() {
            RecordMap::new()
        } else {
            serde_json::from_value(payload.data)?
        };
        return Ok(PushUpdate::Root(records));
    }
    if path.contains('/') {
        return Ok(PushUpdate::Partial {
            path: payload.path,
        });
    }
    if payload.data.is_null() {
        return Ok(PushUpdate::Removed {
            key: path.to_string(),
        });
    }

    Ok(PushUpdate::Record {
        key: path.to_string(),
        record: serde_json::from_value(payload.data)?,
    })
}

fn decode_patch(payload: PushPayload) -> Result<PushUpdate, serde_json::Error> {
    if !payload.path.trim_start_matches('/').is_empty() {
        return Ok(PushUpdate::Partial {
            path: payload.path,
        });
    }
    Ok(PushUpdate::Batch(serde_json::from_value(payload.data)?))
}
