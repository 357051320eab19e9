//! In-process broker over `tokio::sync::broadcast`.
//!
//! One broadcast sender per channel, created on first use. Disconnecting
//! drops every sender, which ends all live subscriptions. A subscriber that
//! falls more than the channel capacity behind skips the missed payloads
//! with a warning instead of failing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::RwLock;
use relay_core::BrokerError;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::subscription::Subscription;

/// Buffered payloads per channel before slow subscribers start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// In-process publish/subscribe broker.
pub struct LocalBroker {
    connected: AtomicBool,
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<Bytes>>>,
}

impl LocalBroker {
    /// Create a disconnected broker with the given per-channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            connected: AtomicBool::new(false),
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<Bytes> {
        if let Some(tx) = self.channels.read().get(channel) {
            return tx.clone();
        }
        self.channels
            .write()
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl Broker for LocalBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            info!(capacity = self.capacity, "local broker connected");
        }
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let dropped = {
                let mut channels = self.channels.write();
                let n = channels.len();
                channels.clear();
                n
            };
            info!(channels = dropped, "local broker disconnected");
        }
    }

    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::PublishFailed {
                channel: channel.to_owned(),
                reason: "broker is not connected".into(),
            });
        }
        // No receivers is not an error for fire-and-forget publishing.
        let receivers = self.sender(channel).send(payload).unwrap_or(0);
        debug!(channel, receivers, "published");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::Unavailable {
                reason: "broker is not connected".into(),
            });
        }
        let rx = self.sender(channel).subscribe();
        let name = channel.to_owned();
        let stream = BroadcastStream::new(rx)
            .filter_map(move |item| {
                let out = match item {
                    Ok(payload) => Some(Ok(payload)),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(channel = %name, skipped, "subscriber lagged, payloads dropped");
                        None
                    }
                };
                futures::future::ready(out)
            })
            .boxed();
        debug!(channel, "subscribed");
        Ok(Subscription::new(channel, stream))
    }

    fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    async fn connected() -> LocalBroker {
        let broker = LocalBroker::default();
        broker.connect().await.unwrap();
        broker
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let broker = connected().await;
        let mut a = broker.subscribe("chat").await.unwrap();
        let mut b = broker.subscribe("chat").await.unwrap();

        broker
            .publish("chat", Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(a.next().await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(b.next().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let broker = connected().await;
        let mut other = broker.subscribe("other").await.unwrap();
        broker
            .publish("chat", Bytes::from_static(b"x"))
            .await
            .unwrap();
        let res = tokio::time::timeout(Duration::from_millis(20), other.next()).await;
        assert!(res.is_err(), "other channel must not see chat traffic");
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let broker = connected().await;
        broker
            .publish("empty", Bytes::from_static(b"x"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn publish_while_disconnected_fails() {
        let broker = LocalBroker::default();
        let err = broker
            .publish("chat", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_matches!(err, BrokerError::PublishFailed { ref channel, .. } if channel == "chat");
    }

    #[tokio::test]
    async fn subscribe_while_disconnected_is_unavailable() {
        let broker = LocalBroker::default();
        assert_matches!(
            broker.subscribe("chat").await,
            Err(BrokerError::Unavailable { .. })
        );
    }

    #[tokio::test]
    async fn connect_is_idempotent_and_disconnect_is_safe_when_never_connected() {
        let broker = LocalBroker::default();
        broker.disconnect().await;
        assert!(!broker.is_connected());
        broker.connect().await.unwrap();
        broker.connect().await.unwrap();
        assert!(broker.is_connected());
    }

    #[tokio::test]
    async fn disconnect_closes_live_subscriptions() {
        let broker = connected().await;
        let mut sub = broker.subscribe("chat").await.unwrap();
        broker.disconnect().await;
        assert_matches!(sub.next().await, Err(BrokerError::SubscriptionClosed { .. }));
        assert_eq!(broker.subscriber_count("chat"), 0);
    }

    #[tokio::test]
    async fn subscriber_count_tracks_release() {
        let broker = connected().await;
        assert_eq!(broker.subscriber_count("chat"), 0);
        let a = broker.subscribe("chat").await.unwrap();
        let b = broker.subscribe("chat").await.unwrap();
        assert_eq!(broker.subscriber_count("chat"), 2);
        a.unsubscribe();
        assert_eq!(broker.subscriber_count("chat"), 1);
        drop(b);
        assert_eq!(broker.subscriber_count("chat"), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_and_keeps_going() {
        let broker = LocalBroker::new(2);
        broker.connect().await.unwrap();
        let mut sub = broker.subscribe("chat").await.unwrap();
        for i in 0..5u8 {
            broker.publish("chat", Bytes::from(vec![i])).await.unwrap();
        }
        // capacity 2: the oldest three were overwritten
        assert_eq!(sub.next().await.unwrap(), Bytes::from(vec![3u8]));
        assert_eq!(sub.next().await.unwrap(), Bytes::from(vec![4u8]));
    }
}
