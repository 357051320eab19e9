//! The remote end of one connection.
//!
//! [`Peer`] is the only surface the coordinator touches. [`WsPeer`] adapts an
//! upgraded axum socket.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use relay_core::RelayError;
use tracing::debug;

/// Standard WebSocket close codes used by the relay.
pub mod close_code {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// Server going away (shutdown).
    pub const AWAY: u16 = 1001;
    /// Credential rejected.
    pub const POLICY: u16 = 1008;
    /// Unexpected server-side failure.
    pub const ERROR: u16 = 1011;
}

/// One live duplex channel to a remote client.
#[async_trait]
pub trait Peer: Send {
    /// Wait for the next text message.
    ///
    /// `Ok(None)` means the peer is gone, whether it sent a close frame or
    /// dropped the transport. Must be cancel-safe: dropping
    /// the future before it resolves loses no message.
    async fn recv(&mut self) -> Result<Option<String>, RelayError>;

    /// Send one text message.
    async fn send_text(&mut self, text: String) -> Result<(), RelayError>;

    /// Close with a status code. Errors are swallowed; the peer may be gone.
    async fn close(&mut self, code: u16, reason: &str);
}

/// [`Peer`] over an upgraded axum WebSocket.
pub struct WsPeer {
    socket: WebSocket,
}

impl WsPeer {
    /// Wrap an upgraded socket.
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Peer for WsPeer {
    async fn recv(&mut self) -> Result<Option<String>, RelayError> {
        loop {
            let frame = match self.socket.recv().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    debug!(error = %e, "socket read failed, treating peer as gone");
                    return Ok(None);
                }
                None => return Ok(None),
            };
            match frame {
                Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => return Ok(Some(text.to_owned())),
                    Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
                },
                Message::Close(frame) => {
                    debug!(code = frame.as_ref().map(|f| f.code), "peer sent close frame");
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), RelayError> {
        self.socket.send(Message::Text(text.into())).await.map_err(|e| {
            debug!(error = %e, "send failed, treating peer as gone");
            RelayError::ConnectionClosed
        })
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code,
            reason: reason.to_owned().into(),
        };
        if let Err(e) = self.socket.send(Message::Close(Some(frame))).await {
            debug!(error = %e, code, "close frame not delivered");
        }
    }
}
