//! Error taxonomy for the relay.
//!
//! - [`BrokerError`]: publish/subscribe transport failures
//! - [`DecodeError`]: malformed message event payloads
//! - [`RelayError`]: everything a connection's duplex loop can terminate with
//!
//! Only [`RelayError::ConnectionClosed`] counts as a clean ending; every other
//! variant is fatal to the connection that raised it and to nothing else.

use thiserror::Error;

/// Failures reported by a broker adapter.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker could not be reached (or was never connected).
    #[error("broker unavailable: {reason}")]
    Unavailable {
        /// What went wrong.
        reason: String,
    },

    /// A publish could not be handed to the broker.
    #[error("publish to channel '{channel}' failed: {reason}")]
    PublishFailed {
        /// Target channel.
        channel: String,
        /// What went wrong.
        reason: String,
    },

    /// The subscription ended: released, or the broker connection dropped.
    #[error("subscription to channel '{channel}' closed")]
    SubscriptionClosed {
        /// Subscribed channel.
        channel: String,
    },
}

impl BrokerError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "broker_unavailable",
            Self::PublishFailed { .. } => "publish_failed",
            Self::SubscriptionClosed { .. } => "subscription_closed",
        }
    }
}

/// A broker payload that is not a well-formed message event.
#[derive(Debug, Error)]
#[error("malformed message event: {source}")]
pub struct DecodeError {
    #[from]
    source: serde_json::Error,
}

/// Terminal outcome of a connection's duplex loop.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The peer went away cleanly.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Broker-side failure.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Credential rejected during the handshake.
    #[error("authorization failed")]
    AuthorizationFailed,

    /// A delivered payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An outbound event could not be serialized.
    #[error("failed to encode message event: {0}")]
    Encode(#[source] serde_json::Error),

    /// The socket failed in a way other than a clean close.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RelayError {
    /// Whether this is the normal end of a connection rather than a failure.
    pub fn is_clean_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }

    /// WebSocket close code sent to the peer when a connection ends with this error.
    pub fn close_code(&self) -> u16 {
        match self {
            Self::ConnectionClosed => 1000,
            Self::AuthorizationFailed => 1008,
            _ => 1011,
        }
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::ConnectionClosed => "connection_closed",
            Self::Broker(e) => e.error_kind(),
            Self::AuthorizationFailed => "authorization_failed",
            Self::Decode(_) => "decode_error",
            Self::Encode(_) => "encode_error",
            Self::Transport(_) => "transport_error",
        }
    }
}
