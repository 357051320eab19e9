//! # relay-server
//!
//! Axum HTTP + WebSocket server for the chat relay.
//!
//! - **Coordinator**: per-connection duplex loop racing peer input against
//!   server-side events, with exactly-once teardown
//! - **Flows**: echo-and-heartbeat and broadcast-chat
//! - **Endpoints**: `/`, `/ws`, `/chat/ws`, `/dependencies/ws`, `/health`, `/metrics`
//! - **Shutdown**: tracked connection tasks closed with 1001 on shutdown

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use auth::{StaticTokenVerifier, TokenVerifier};
pub use config::ServerConfig;
pub use server::{AppState, RelayServer, ServerError};
