//! # relay-gateway
//!
//! Chat relay server binary. Loads settings, wires the broker, verifier and
//! metrics into the server, and runs until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use relay_broker::LocalBroker;
use relay_core::logging::init_subscriber;
use relay_server::{RelayServer, ServerConfig, StaticTokenVerifier};
use relay_settings::RelaySettings;

/// Real-time chat relay server.
#[derive(Parser, Debug)]
#[command(name = "relay-gateway", about = "Real-time chat relay server")]
struct Cli {
    /// Settings file (defaults to `~/.relay/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn load_settings(&self) -> Result<RelaySettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(relay_settings::settings_path);
        let mut settings = relay_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        Ok(settings)
    }

    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn build_server(settings: &RelaySettings, metrics: PrometheusHandle) -> RelayServer {
    let broker = Arc::new(LocalBroker::new(settings.chat.broker_capacity));
    let verifier = Arc::new(StaticTokenVerifier::new(settings.auth.api_token.clone()));
    RelayServer::new(
        ServerConfig::from_settings(settings),
        broker,
        verifier,
        metrics,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    init_subscriber(&settings.logging.level, settings.logging.format);

    if settings.auth.api_token.is_none() {
        tracing::warn!("no API token configured, /dependencies/ws will reject every connection");
    }

    let metrics = relay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let server = build_server(&settings, metrics);
    let (addr, handle) = server
        .start()
        .await
        .context("Failed to start relay server")?;
    tracing::info!(channel = %settings.chat.channel, "relay listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !server.stop().await {
        tracing::warn!("some connections did not close before the shutdown timeout");
    }
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
