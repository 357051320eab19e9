//! Broker adapter interface.

use async_trait::async_trait;
use bytes::Bytes;
use relay_core::BrokerError;

use crate::subscription::Subscription;

/// Publish/subscribe service shared by all connections.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Establish the underlying connection. Calling it again while
    /// connected is a no-op.
    async fn connect(&self) -> Result<(), BrokerError>;

    /// Release the underlying connection. Safe to call when never connected.
    /// Live subscriptions end with [`BrokerError::SubscriptionClosed`].
    async fn disconnect(&self);

    /// Hand one encoded event to every current subscriber of `channel`.
    ///
    /// Fire-and-forget: success means the broker accepted the payload, not
    /// that anyone received it.
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BrokerError>;

    /// Open a subscription to `channel`.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError>;

    /// Number of open subscriptions on `channel`.
    fn subscriber_count(&self, channel: &str) -> usize;

    /// Whether `connect` has succeeded and `disconnect` has not been called since.
    fn is_connected(&self) -> bool;
}
