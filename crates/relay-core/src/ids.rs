//! Connection identity.
//!
//! A connection has two names: the display name chosen by the client (not
//! unique, shown to other peers) and a [`ConnectionId`] minted by the server
//! for every socket. Self-echo filtering compares connection ids only, so two
//! clients that pick the same display name still see each other's messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name used when a client does not supply one.
pub const DEFAULT_USERNAME: &str = "Anonymous";

/// Unique identifier for one live connection.
///
/// Generated as `conn_<uuid v7>` so ids sort by creation time in logs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Mint a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Who a connection speaks as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Server-assigned unique id, used for self-echo filtering.
    pub connection_id: ConnectionId,
    /// Client-chosen display name, used for attribution.
    pub username: String,
}

impl Identity {
    /// New identity with a freshly minted connection id.
    ///
    /// Blank usernames fall back to [`DEFAULT_USERNAME`].
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        let username = if username.trim().is_empty() {
            DEFAULT_USERNAME.to_owned()
        } else {
            username
        };
        Self {
            connection_id: ConnectionId::new(),
            username,
        }
    }

    /// Anonymous identity.
    pub fn anonymous() -> Self {
        Self::new(DEFAULT_USERNAME)
    }
}
