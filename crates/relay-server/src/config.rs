//! Server configuration.

use std::time::Duration;

use relay_settings::RelaySettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for the relay server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Idle time before the echo flow sends a current-time notice.
    pub heartbeat_interval_ms: u64,
    /// How long shutdown waits for open connections.
    pub shutdown_timeout_secs: u64,
    /// Broker channel carrying chat traffic.
    pub chat_channel: String,
    /// Display name for chat clients that do not supply one.
    pub default_username: String,
}

impl ServerConfig {
    /// Derive the runtime view from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_message_size: settings.server.max_message_size,
            heartbeat_interval_ms: settings.heartbeat.interval_ms,
            shutdown_timeout_secs: settings.server.shutdown_timeout_secs,
            chat_channel: settings.chat.channel.clone(),
            default_username: settings.chat.default_username.clone(),
        }
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut config = Self::from_settings(&RelaySettings::default());
        config.port = 0;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_zero() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.host, "127.0.0.1");
    }

    #[test]
    fn default_chat_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.chat_channel, "chat");
        assert_eq!(cfg.default_username, "Anonymous");
    }

    #[test]
    fn from_settings_copies_every_section() {
        let mut settings = RelaySettings::default();
        settings.server.host = "0.0.0.0".into();
        settings.server.port = 9100;
        settings.heartbeat.interval_ms = 1500;
        settings.chat.channel = "lobby".into();
        settings.server.shutdown_timeout_secs = 3;

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9100");
        assert_eq!(cfg.heartbeat_interval(), Duration::from_millis(1500));
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.chat_channel, "lobby");
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
