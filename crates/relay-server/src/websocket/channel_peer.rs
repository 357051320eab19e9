//! In-process [`Peer`] over mpsc channels, for driving a coordinator
//! without a network.

use async_trait::async_trait;
use relay_core::RelayError;
use tokio::sync::mpsc;

use super::peer::Peer;

/// Frames a [`ChannelPeer`] emits towards its client half.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerFrame {
    /// A text message.
    Text(String),
    /// The server closed the connection.
    Close {
        /// Close status code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// In-process [`Peer`] backed by mpsc channels.
#[derive(Debug)]
pub struct ChannelPeer {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<PeerFrame>,
}

/// The client half of a [`ChannelPeer`].
#[derive(Debug)]
pub struct PeerHandle {
    to_server: Option<mpsc::UnboundedSender<String>>,
    from_server: mpsc::UnboundedReceiver<PeerFrame>,
}

impl ChannelPeer {
    /// A connected server/client pair.
    pub fn pair() -> (Self, PeerHandle) {
        let (to_server, inbound) = mpsc::unbounded_channel();
        let (outbound, from_server) = mpsc::unbounded_channel();
        (
            Self { inbound, outbound },
            PeerHandle {
                to_server: Some(to_server),
                from_server,
            },
        )
    }
}

#[async_trait]
impl Peer for ChannelPeer {
    async fn recv(&mut self) -> Result<Option<String>, RelayError> {
        Ok(self.inbound.recv().await)
    }

    async fn send_text(&mut self, text: String) -> Result<(), RelayError> {
        self.outbound
            .send(PeerFrame::Text(text))
            .map_err(|_| RelayError::ConnectionClosed)
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let _ = self.outbound.send(PeerFrame::Close {
            code,
            reason: reason.to_owned(),
        });
    }
}

impl PeerHandle {
    /// Send text to the server. Returns `false` once hung up or the server is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.to_server
            .as_ref()
            .is_some_and(|tx| tx.send(text.into()).is_ok())
    }

    /// Close the client side; the server sees a clean disconnect.
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    /// Next frame from the server, `None` once the server half is dropped.
    pub async fn recv(&mut self) -> Option<PeerFrame> {
        self.from_server.recv().await
    }

    /// Next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<PeerFrame> {
        self.from_server.try_recv().ok()
    }

    /// Next frame, expecting text.
    pub async fn recv_text(&mut self) -> Option<String> {
        match self.recv().await? {
            PeerFrame::Text(text) => Some(text),
            PeerFrame::Close { .. } => None,
        }
    }
}
