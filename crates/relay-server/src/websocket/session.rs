//! Connection session lifecycle, from upgrade through teardown.
//!
//! [`run_session`] builds the flow a connection asked for, registers the
//! connection, and hands both to a [`Coordinator`]. [`reject_session`] is the
//! Handshake failure path: close with a policy violation and allocate nothing.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use relay_broker::Broker;
use relay_core::Identity;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::chat::BroadcastChat;
use super::coordinator::Coordinator;
use super::echo::EchoHeartbeat;
use super::flow::{DuplexFlow, FlowKind};
use super::peer::{Peer, close_code};
use super::registry::ConnectionRegistry;
use crate::metrics::{WS_AUTH_REJECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// What a connection runs once accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionPlan {
    /// Echo with `ack_prefix`; optionally greet `username` first.
    EchoHeartbeat {
        /// Acknowledgment prefix.
        ack_prefix: &'static str,
        /// Display name, `None` for anonymous.
        username: Option<String>,
        /// Send `Hello, {username}!` before the first iteration.
        greet: bool,
    },
    /// Join the chat channel as `username`.
    BroadcastChat {
        /// Display name.
        username: String,
    },
}

impl SessionPlan {
    fn kind(&self) -> FlowKind {
        match self {
            Self::EchoHeartbeat { .. } => FlowKind::EchoHeartbeat,
            Self::BroadcastChat { .. } => FlowKind::BroadcastChat,
        }
    }

    fn identity(&self) -> Identity {
        match self {
            Self::EchoHeartbeat { username: None, .. } => Identity::anonymous(),
            Self::EchoHeartbeat {
                username: Some(name),
                ..
            }
            | Self::BroadcastChat { username: name } => Identity::new(name.as_str()),
        }
    }
}

/// Shared collaborators every session needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Chat fan-out.
    pub broker: Arc<dyn Broker>,
    /// Live connection set.
    pub registry: Arc<ConnectionRegistry>,
    /// Fires on server shutdown.
    pub cancel: CancellationToken,
    /// Chat channel name.
    pub channel: String,
    /// Echo flow idle interval.
    pub heartbeat_interval: Duration,
}

/// Run an accepted connection to completion.
pub async fn run_session<P: Peer>(mut peer: P, plan: SessionPlan, ctx: SessionContext) {
    let identity = plan.identity();
    let kind = plan.kind();

    let (flow, greeting): (Box<dyn DuplexFlow>, Option<String>) = match &plan {
        SessionPlan::EchoHeartbeat {
            ack_prefix, greet, ..
        } => (
            Box::new(EchoHeartbeat::new(*ack_prefix, ctx.heartbeat_interval)),
            greet.then(|| format!("Hello, {}!", identity.username)),
        ),
        SessionPlan::BroadcastChat { .. } => {
            match BroadcastChat::join(Arc::clone(&ctx.broker), &ctx.channel, identity.clone())
                .await
            {
                Ok(chat) => (Box::new(chat), None),
                Err(e) => {
                    warn!(
                        connection_id = %identity.connection_id,
                        error = %e,
                        "could not join chat channel"
                    );
                    counter!(WS_DISCONNECTIONS_TOTAL, "outcome" => "error").increment(1);
                    peer.close(e.close_code(), "chat unavailable").await;
                    return;
                }
            }
        }
    };

    let _registration = ctx
        .registry
        .register(identity.connection_id.clone(), &identity.username, kind);

    let mut coordinator = Coordinator::new(peer, flow, identity, ctx.cancel);
    if let Some(greeting) = greeting {
        coordinator = coordinator.with_greeting(greeting);
    }
    // Outcome is logged by the coordinator.
    let _ = coordinator.run().await;
}

/// Refuse a connection whose credential failed verification.
pub async fn reject_session<P: Peer>(mut peer: P) {
    counter!(WS_AUTH_REJECTIONS_TOTAL).increment(1);
    info!("closing connection with policy violation");
    peer.close(close_code::POLICY, "credential rejected").await;
}
