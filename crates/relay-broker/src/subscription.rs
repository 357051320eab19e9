//! Owned subscription handle.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::{BoxStream, Fuse};
use relay_core::BrokerError;
use tracing::debug;

/// A live sequence of payloads delivered on one channel.
///
/// The handle is the subscription: dropping it or calling
/// [`unsubscribe`](Self::unsubscribe) releases it, and since both consume
/// the handle a subscription is released exactly once.
pub struct Subscription {
    channel: String,
    stream: Fuse<BoxStream<'static, Result<Bytes, BrokerError>>>,
}

impl Subscription {
    /// Wrap a payload stream. The stream ending means the broker side
    /// closed the subscription.
    pub fn new(
        channel: impl Into<String>,
        stream: BoxStream<'static, Result<Bytes, BrokerError>>,
    ) -> Self {
        Self {
            channel: channel.into(),
            stream: stream.fuse(),
        }
    }

    /// Channel this subscription is attached to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next payload.
    ///
    /// Cancel-safe: dropping the returned future before it resolves loses
    /// no payload.
    pub async fn next(&mut self) -> Result<Bytes, BrokerError> {
        match self.stream.next().await {
            Some(item) => item,
            None => Err(BrokerError::SubscriptionClosed {
                channel: self.channel.clone(),
            }),
        }
    }

    /// Release the subscription.
    pub fn unsubscribe(self) {
        debug!(channel = %self.channel, "subscription released");
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
