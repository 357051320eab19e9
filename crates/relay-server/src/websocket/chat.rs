//! Broadcast-chat flow.
//!
//! Inbound text is wrapped in a [`MessageEvent`] stamped with this
//! connection's identity and published to the shared channel. Outbound, every
//! event on the channel is decoded and forwarded unless this connection
//! published it.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use relay_broker::{Broker, Subscription};
use relay_core::{BrokerError, Identity, MessageEvent, RelayError};
use tracing::{debug, trace};

use super::flow::{DuplexFlow, FlowKind};
use crate::metrics::{
    CHAT_MESSAGES_DELIVERED_TOTAL, CHAT_MESSAGES_PUBLISHED_TOTAL, CHAT_SELF_FILTERED_TOTAL,
};

/// One connection's membership in a chat channel.
pub struct BroadcastChat {
    broker: Arc<dyn Broker>,
    channel: String,
    identity: Identity,
    subscription: Option<Subscription>,
}

impl BroadcastChat {
    /// Subscribe to `channel` as `identity`.
    pub async fn join(
        broker: Arc<dyn Broker>,
        channel: &str,
        identity: Identity,
    ) -> Result<Self, RelayError> {
        let subscription = broker.subscribe(channel).await?;
        debug!(
            channel,
            connection_id = %identity.connection_id,
            username = %identity.username,
            "joined chat channel"
        );
        Ok(Self {
            broker,
            channel: channel.to_owned(),
            identity,
            subscription: Some(subscription),
        })
    }

    /// Who this connection speaks as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

#[async_trait]
impl DuplexFlow for BroadcastChat {
    fn kind(&self) -> FlowKind {
        FlowKind::BroadcastChat
    }

    async fn on_inbound(&mut self, text: String) -> Result<Option<String>, RelayError> {
        let payload = MessageEvent::from_identity(&self.identity, text).encode()?;
        self.broker.publish(&self.channel, payload).await?;
        counter!(CHAT_MESSAGES_PUBLISHED_TOTAL).increment(1);
        debug!(channel = %self.channel, "published chat message");
        Ok(None)
    }

    async fn next_outbound(&mut self) -> Result<Option<String>, RelayError> {
        let subscription =
            self.subscription
                .as_mut()
                .ok_or_else(|| BrokerError::SubscriptionClosed {
                    channel: self.channel.clone(),
                })?;
        let payload = subscription.next().await?;

        let event = MessageEvent::decode(&payload)?;
        if event.is_from(&self.identity.connection_id) {
            trace!("discarding own event");
            counter!(CHAT_SELF_FILTERED_TOTAL).increment(1);
            return Ok(None);
        }
        counter!(CHAT_MESSAGES_DELIVERED_TOTAL).increment(1);
        Ok(Some(event.to_peer_json()?))
    }

    async fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bytes::Bytes;
    use relay_broker::LocalBroker;
    use std::time::Duration;

    async fn broker() -> Arc<LocalBroker> {
        let broker = Arc::new(LocalBroker::default());
        broker.connect().await.unwrap();
        broker
    }

    #[tokio::test]
    async fn publish_reaches_others_but_not_self() {
        let broker = broker().await;
        let mut alice = BroadcastChat::join(broker.clone(), "chat", Identity::new("alice"))
            .await
            .unwrap();
        let mut bob = BroadcastChat::join(broker.clone(), "chat", Identity::new("bob"))
            .await
            .unwrap();

        assert_eq!(alice.on_inbound("hello".into()).await.unwrap(), None);

        let delivered = bob.next_outbound().await.unwrap().unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&delivered).unwrap(),
            serde_json::json!({"username": "alice", "message": "hello"})
        );
        // alice sees her own event and drops it
        assert_eq!(alice.next_outbound().await.unwrap(), None);
    }

    #[tokio::test]
    async fn same_display_name_is_still_delivered() {
        let broker = broker().await;
        let mut first = BroadcastChat::join(broker.clone(), "chat", Identity::new("sam"))
            .await
            .unwrap();
        let mut second = BroadcastChat::join(broker.clone(), "chat", Identity::new("sam"))
            .await
            .unwrap();

        let _ = first.on_inbound("hi".into()).await.unwrap();
        let delivered = second.next_outbound().await.unwrap();
        assert!(delivered.is_some());
    }

    #[tokio::test]
    async fn foreign_event_without_origin_is_delivered() {
        let broker = broker().await;
        let mut chat = BroadcastChat::join(broker.clone(), "chat", Identity::new("alice"))
            .await
            .unwrap();
        broker
            .publish(
                "chat",
                Bytes::from_static(br#"{"username":"alice","message":"from elsewhere"}"#),
            )
            .await
            .unwrap();
        assert!(chat.next_outbound().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn malformed_payload_is_decode_error() {
        let broker = broker().await;
        let mut chat = BroadcastChat::join(broker.clone(), "chat", Identity::anonymous())
            .await
            .unwrap();
        broker
            .publish("chat", Bytes::from_static(br#"{"username":"x"}"#))
            .await
            .unwrap();
        assert_matches!(chat.next_outbound().await, Err(RelayError::Decode(_)));
    }

    #[tokio::test]
    async fn join_fails_when_broker_down() {
        let broker = Arc::new(LocalBroker::default());
        let res = BroadcastChat::join(broker, "chat", Identity::anonymous()).await;
        assert_matches!(
            res.err(),
            Some(RelayError::Broker(BrokerError::Unavailable { .. }))
        );
    }

    #[tokio::test]
    async fn release_unsubscribes_once() {
        let broker = broker().await;
        let mut chat = BroadcastChat::join(broker.clone(), "chat", Identity::anonymous())
            .await
            .unwrap();
        assert_eq!(broker.subscriber_count("chat"), 1);
        chat.release().await;
        chat.release().await;
        assert_eq!(broker.subscriber_count("chat"), 0);
        assert_matches!(
            chat.next_outbound().await,
            Err(RelayError::Broker(BrokerError::SubscriptionClosed { .. }))
        );
    }

    #[tokio::test]
    async fn cancelled_outbound_loses_nothing() {
        let broker = broker().await;
        let mut alice = BroadcastChat::join(broker.clone(), "chat", Identity::new("alice"))
            .await
            .unwrap();
        let mut bob = BroadcastChat::join(broker.clone(), "chat", Identity::new("bob"))
            .await
            .unwrap();

        let idle = tokio::time::timeout(Duration::from_millis(20), bob.next_outbound()).await;
        assert!(idle.is_err());

        let _ = alice.on_inbound("after".into()).await.unwrap();
        let delivered = bob.next_outbound().await.unwrap().unwrap();
        assert!(delivered.contains("after"));
    }
}
