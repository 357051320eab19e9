//! The message event exchanged on the chat channel.
//!
//! Wire format is a JSON object:
//!
//! ```json
//! {"username": "alice", "message": "hello", "origin": "conn_0192..."}
//! ```
//!
//! `username` and `message` are required; decoding a record without either
//! fails instead of defaulting. `origin` is optional so payloads from
//! publishers that predate it still decode, and unknown fields are ignored.

use bytes::Bytes;
use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{DecodeError, RelayError};
use crate::ids::{ConnectionId, Identity};

/// One chat message as carried by the broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Display name of the sender.
    pub username: String,
    /// Message body.
    pub message: String,
    /// Connection that published the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ConnectionId>,
}

/// What a peer receives for a delivered event. The origin stays server-side.
#[derive(Serialize)]
struct PeerFrame<'a> {
    username: &'a str,
    message: &'a str,
}

impl MessageEvent {
    /// Wrap a message body sent by `identity`.
    pub fn from_identity(identity: &Identity, message: impl Into<String>) -> Self {
        Self {
            username: identity.username.clone(),
            message: message.into(),
            origin: Some(identity.connection_id.clone()),
        }
    }

    /// Serialize for publishing.
    pub fn encode(&self) -> Result<Bytes, RelayError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(RelayError::Encode)
    }

    /// Parse a delivered payload.
    ///
    /// Only a JSON object is a record; arrays are rejected rather than read
    /// positionally.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        match serde_json::from_slice::<Value>(payload)? {
            record @ Value::Object(_) => Ok(serde_json::from_value(record)?),
            other => Err(
                serde_json::Error::invalid_type(unexpected(&other), &"a JSON object").into(),
            ),
        }
    }

    /// Whether the event was published by the given connection.
    pub fn is_from(&self, connection_id: &ConnectionId) -> bool {
        self.origin.as_ref() == Some(connection_id)
    }

    /// JSON text forwarded to a peer: `{"username": .., "message": ..}`.
    pub fn to_peer_json(&self) -> Result<String, RelayError> {
        serde_json::to_string(&PeerFrame {
            username: &self.username,
            message: &self.message,
        })
        .map_err(RelayError::Encode)
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}
