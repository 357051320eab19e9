//! Live connection registry.
//!
//! Entries are added by [`ConnectionRegistry::register`] and removed when the
//! returned [`Registration`] guard drops, so every exit path of a connection
//! task deregisters.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use relay_core::ConnectionId;
use serde::Serialize;

use super::flow::FlowKind;

/// What the registry knows about one connection.
#[derive(Clone, Debug, Serialize)]
pub struct ConnectionInfo {
    /// Connection id.
    pub id: ConnectionId,
    /// Display name.
    pub username: String,
    /// Flow variant label.
    pub flow: &'static str,
    /// When the connection entered Active.
    pub connected_at: DateTime<Utc>,
}

/// Process-wide set of open connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionInfo>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection until the returned guard drops.
    #[must_use = "the connection deregisters when the guard drops"]
    pub fn register(
        self: &Arc<Self>,
        id: ConnectionId,
        username: &str,
        flow: FlowKind,
    ) -> Registration {
        let info = ConnectionInfo {
            id: id.clone(),
            username: username.to_owned(),
            flow: flow.as_str(),
            connected_at: Utc::now(),
        };
        let _ = self.connections.insert(id.clone(), info);
        Registration {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is open.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Copy of every entry.
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        self.connections.iter().map(|e| e.value().clone()).collect()
    }
}

/// Deregisters its connection on drop.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl Registration {
    /// The registered connection.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let _ = self.registry.connections.remove(&self.id);
    }
}
