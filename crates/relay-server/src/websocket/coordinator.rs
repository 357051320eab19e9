//! Per-connection duplex coordinator.
//!
//! Each iteration races three suspension points: the shutdown token, the
//! peer's next message, and the flow's next server-side event. The first to
//! resolve wins, with ties broken at random; the others are dropped in place
//! before anything is sent. Sending happens only after the race, so a losing
//! flow never partially delivers.
//!
//! The loop ends on a clean peer close, on shutdown, or on the first error
//! from either side. Teardown then runs exactly once: the flow releases its
//! resources and the peer gets a close frame matching the outcome.

use std::time::Instant;

use metrics::{counter, gauge, histogram};
use relay_core::{Identity, RelayError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::flow::DuplexFlow;
use super::peer::{Peer, close_code};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// How a connection ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The peer closed the connection.
    PeerClosed,
    /// The server is shutting down.
    Shutdown,
}

impl Termination {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::Shutdown => "shutdown",
        }
    }
}

enum Step {
    Inbound(Option<String>),
    Outbound(Option<String>),
}

/// Drives one connection from Active to Closed.
pub struct Coordinator<P> {
    peer: P,
    flow: Box<dyn DuplexFlow>,
    identity: Identity,
    cancel: CancellationToken,
    greeting: Option<String>,
}

impl<P: Peer> Coordinator<P> {
    /// Coordinator for `peer` running `flow`, stopped early by `cancel`.
    pub fn new(
        peer: P,
        flow: Box<dyn DuplexFlow>,
        identity: Identity,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            peer,
            flow,
            identity,
            cancel,
            greeting: None,
        }
    }

    /// Send `greeting` once before the first iteration.
    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// Run until the connection ends, then tear down.
    ///
    /// A clean peer close returns `Ok(Termination::PeerClosed)`. Any other
    /// failure is returned after teardown with its original cause.
    #[instrument(
        name = "connection",
        skip_all,
        fields(
            connection_id = %self.identity.connection_id,
            username = %self.identity.username,
            flow = %self.flow.kind(),
        )
    )]
    pub async fn run(mut self) -> Result<Termination, RelayError> {
        let kind = self.flow.kind();
        let started = Instant::now();
        counter!(WS_CONNECTIONS_TOTAL, "flow" => kind.as_str()).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
        info!("connection active");

        let outcome = match self.drive().await {
            Err(e) if e.is_clean_disconnect() => Ok(Termination::PeerClosed),
            other => other,
        };
        self.teardown(&outcome).await;

        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(WS_CONNECTION_DURATION_SECONDS, "flow" => kind.as_str())
            .record(started.elapsed().as_secs_f64());
        let label = match &outcome {
            Ok(termination) => {
                info!(termination = termination.as_str(), "connection closed");
                termination.as_str()
            }
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "connection failed");
                "error"
            }
        };
        counter!(WS_DISCONNECTIONS_TOTAL, "outcome" => label).increment(1);
        outcome
    }

    async fn drive(&mut self) -> Result<Termination, RelayError> {
        if let Some(greeting) = self.greeting.take() {
            self.peer.send_text(greeting).await?;
        }

        loop {
            if self.cancel.is_cancelled() {
                return Ok(Termination::Shutdown);
            }
            // Unbiased: neither a busy peer nor a busy flow may starve the other.
            let step = tokio::select! {
                () = self.cancel.cancelled() => return Ok(Termination::Shutdown),
                inbound = self.peer.recv() => Step::Inbound(inbound?),
                outbound = self.flow.next_outbound() => Step::Outbound(outbound?),
            };

            match step {
                Step::Inbound(None) => return Ok(Termination::PeerClosed),
                Step::Inbound(Some(text)) => {
                    debug!(len = text.len(), "inbound message");
                    if let Some(reply) = self.flow.on_inbound(text).await? {
                        self.peer.send_text(reply).await?;
                    }
                }
                Step::Outbound(Some(text)) => self.peer.send_text(text).await?,
                Step::Outbound(None) => {}
            }
        }
    }

    async fn teardown(&mut self, outcome: &Result<Termination, RelayError>) {
        self.flow.release().await;
        let (code, reason) = match outcome {
            Ok(Termination::PeerClosed) => (close_code::NORMAL, ""),
            Ok(Termination::Shutdown) => (close_code::AWAY, "server shutting down"),
            Err(e) => (e.close_code(), "internal error"),
        };
        self.peer.close(code, reason).await;
    }
}
