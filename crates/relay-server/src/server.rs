//! `RelayServer`: Axum HTTP and WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_broker::Broker;
use relay_core::BrokerError;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::TokenVerifier;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::endpoints;
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::session::SessionContext;

/// Failures while bringing the server up.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The broker could not be connected.
    #[error("broker connect failed: {0}")]
    Broker(#[from] BrokerError),
    /// The listener could not be bound.
    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Chat fan-out.
    pub broker: Arc<dyn Broker>,
    /// Credential check for the authenticated endpoint.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Live connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
    /// When the server started.
    pub start_time: Instant,
}

impl AppState {
    /// Collaborators handed to each accepted connection.
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            broker: Arc::clone(&self.broker),
            registry: Arc::clone(&self.registry),
            cancel: self.shutdown.token(),
            channel: self.config.chat_channel.clone(),
            heartbeat_interval: self.config.heartbeat_interval(),
        }
    }
}

/// The relay server.
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Create a new server around an injected broker and verifier.
    pub fn new(
        config: ServerConfig,
        broker: Arc<dyn Broker>,
        verifier: Arc<dyn TokenVerifier>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            state: AppState {
                config: Arc::new(config),
                broker,
                verifier,
                registry: Arc::new(ConnectionRegistry::new()),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                metrics,
                start_time: Instant::now(),
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(home_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(endpoints::ws_handler))
            .route("/chat/ws", get(endpoints::chat_ws_handler))
            .route("/dependencies/ws", get(endpoints::dependencies_ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Startup hook: connect the broker, then bind and serve.
    pub async fn start(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        self.state.broker.connect().await?;
        Ok(self.listen().await?)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.state.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.state.shutdown.token();
        info!(%addr, "relay server listening");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Shutdown hook: close every connection, then disconnect the broker.
    ///
    /// Returns `false` if connections were still open at the timeout.
    pub async fn stop(&self) -> bool {
        let drained = self
            .state
            .shutdown
            .graceful_shutdown(self.state.config.shutdown_timeout())
            .await;
        self.state.broker.disconnect().await;
        info!(drained, "relay server stopped");
        drained
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.state.registry
    }

    /// Get the broker.
    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.state.broker
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }
}

/// GET /
async fn home_handler() -> Json<Value> {
    Json(json!({ "message": "Hello World" }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.len(),
        state.broker.is_connected(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    metrics::render(&state.metrics)
}
