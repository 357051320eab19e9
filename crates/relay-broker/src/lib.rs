//! # relay-broker
//!
//! Uniform publish/subscribe primitive over a message channel.
//!
//! - [`Broker`]: the adapter interface the connection coordinator depends on
//! - [`Subscription`]: a live, owned sequence of payloads for one channel
//! - [`LocalBroker`]: in-process implementation over `tokio::sync::broadcast`
//!
//! The broker is constructed once, connected by the process startup hook,
//! shared as `Arc<dyn Broker>` by every connection, and disconnected by the
//! shutdown hook. Delivery includes the publisher's own subscriptions;
//! filtering self-originated events is the caller's job.

#![deny(unsafe_code)]

pub mod broker;
pub mod local;
pub mod subscription;

pub use broker::Broker;
pub use local::{DEFAULT_CHANNEL_CAPACITY, LocalBroker};
pub use subscription::Subscription;
