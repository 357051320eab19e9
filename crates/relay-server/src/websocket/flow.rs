//! The two halves of a connection's duplex traffic.

use std::fmt;

use async_trait::async_trait;
use relay_core::RelayError;

/// Which flow variant a connection runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
    /// Acknowledge each peer message; emit a current-time notice when idle.
    EchoHeartbeat,
    /// Publish peer messages to the shared channel; deliver everyone else's.
    BroadcastChat,
}

impl FlowKind {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EchoHeartbeat => "echo_heartbeat",
            Self::BroadcastChat => "broadcast_chat",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-connection behavior raced by the coordinator.
///
/// The coordinator owns all I/O with the peer. A flow only decides what to
/// send: [`on_inbound`](Self::on_inbound) reacts to a peer message and
/// [`next_outbound`](Self::next_outbound) waits for something server-side.
/// Both return the text to send, or `None` for an iteration that sends nothing.
#[async_trait]
pub trait DuplexFlow: Send {
    /// Which variant this is.
    fn kind(&self) -> FlowKind;

    /// Handle one message from the peer. Runs after the race is decided and
    /// is never cancelled.
    async fn on_inbound(&mut self, text: String) -> Result<Option<String>, RelayError>;

    /// Wait for the next server-side event.
    ///
    /// Raced against the peer receive and dropped if the peer wins, so it
    /// must be cancel-safe and must not perform visible side effects.
    async fn next_outbound(&mut self) -> Result<Option<String>, RelayError>;

    /// Release held resources. Called once when the connection ends; the
    /// flow is not polled afterwards.
    async fn release(&mut self);
}
