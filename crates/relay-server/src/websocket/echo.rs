//! Echo-and-heartbeat flow.
//!
//! Every peer message is acknowledged with `{ack_prefix}{text}`. When the
//! peer stays quiet for a full interval a current-time notice goes out
//! instead. The timer is re-armed every iteration, so a chatty peer never
//! sees a notice.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use metrics::counter;
use relay_core::RelayError;

use super::flow::{DuplexFlow, FlowKind};
use crate::metrics::{ECHO_REPLIES_TOTAL, HEARTBEAT_NOTICES_TOTAL};

/// Acknowledgment prefix on the plain `/ws` endpoint.
pub const ACK_RECEIVED: &str = "Message received: ";
/// Acknowledgment prefix on the authenticated endpoint.
pub const ACK_TEXT_WAS: &str = "Message text was: ";

/// Echo each inbound message, emit the server clock when idle.
#[derive(Clone, Debug)]
pub struct EchoHeartbeat {
    ack_prefix: String,
    interval: Duration,
}

impl EchoHeartbeat {
    /// Flow acknowledging with `ack_prefix` and idling for `interval`.
    pub fn new(ack_prefix: impl Into<String>, interval: Duration) -> Self {
        Self {
            ack_prefix: ack_prefix.into(),
            interval,
        }
    }

    /// The acknowledgment for `text`.
    pub fn acknowledge(&self, text: &str) -> String {
        format!("{}{text}", self.ack_prefix)
    }
}

/// Current-time notice text.
pub fn time_notice(now: DateTime<Utc>) -> String {
    format!(
        "Current time: {}",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

#[async_trait]
impl DuplexFlow for EchoHeartbeat {
    fn kind(&self) -> FlowKind {
        FlowKind::EchoHeartbeat
    }

    async fn on_inbound(&mut self, text: String) -> Result<Option<String>, RelayError> {
        counter!(ECHO_REPLIES_TOTAL).increment(1);
        Ok(Some(self.acknowledge(&text)))
    }

    async fn next_outbound(&mut self) -> Result<Option<String>, RelayError> {
        tokio::time::sleep(self.interval).await;
        counter!(HEARTBEAT_NOTICES_TOTAL).increment(1);
        Ok(Some(time_notice(Utc::now())))
    }

    async fn release(&mut self) {}
}
