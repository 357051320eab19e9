//! WebSocket connection handling: peers, flows, the duplex coordinator, and
//! the upgrade endpoints that wire them together.

#[cfg(any(test, feature = "test-util"))]
pub mod channel_peer;
pub mod chat;
pub mod coordinator;
pub mod echo;
pub mod endpoints;
pub mod flow;
pub mod peer;
pub mod registry;
pub mod session;

pub use coordinator::{Coordinator, Termination};
pub use flow::{DuplexFlow, FlowKind};
#[cfg(any(test, feature = "test-util"))]
pub use channel_peer::{ChannelPeer, PeerFrame, PeerHandle};
pub use peer::{Peer, WsPeer};
pub use registry::ConnectionRegistry;
