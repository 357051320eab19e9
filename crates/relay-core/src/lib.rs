//! # relay-core
//!
//! Foundation types shared by every relay crate:
//!
//! - **Identity**: [`ConnectionId`] (unique per socket) and [`Identity`] (display name + id)
//! - **Message events**: [`MessageEvent`], the field-tagged record exchanged on the broker channel
//! - **Errors**: [`RelayError`] taxonomy plus [`BrokerError`] and [`DecodeError`] via `thiserror`
//! - **Logging**: [`logging::init_subscriber`] for the global `tracing` subscriber

#![deny(unsafe_code)]

pub mod errors;
pub mod event;
pub mod ids;
pub mod logging;

pub use errors::{BrokerError, DecodeError, RelayError};
pub use event::MessageEvent;
pub use ids::{ConnectionId, DEFAULT_USERNAME, Identity};
