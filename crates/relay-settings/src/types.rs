//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may contain any subset of fields.

use relay_core::DEFAULT_USERNAME;
use relay_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "heartbeat": { "intervalMs": 5000 },
///   "auth": { "apiToken": "secret" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Network listener settings.
    pub server: ServerSettings,
    /// Broadcast-chat settings.
    pub chat: ChatSettings,
    /// Echo-and-heartbeat settings.
    pub heartbeat: HeartbeatSettings,
    /// Credential settings for the authenticated endpoint.
    pub auth: AuthSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat.interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "heartbeat.intervalMs must be greater than zero".into(),
            ));
        }
        if self.chat.channel.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "chat.channel must not be empty".into(),
            ));
        }
        if self.chat.broker_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "chat.brokerCapacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Network listener settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Largest accepted WebSocket message in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for connections to wind down.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_message_size: 64 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Broadcast-chat settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// The single broker channel carrying all chat traffic.
    pub channel: String,
    /// Display name for clients that do not send one.
    pub default_username: String,
    /// Buffered events per channel in the in-process broker.
    pub broker_capacity: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            channel: "chat".to_string(),
            default_username: DEFAULT_USERNAME.to_string(),
            broker_capacity: 1024,
        }
    }
}

/// Echo-and-heartbeat settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatSettings {
    /// Idle time before a current-time notice is sent.
    pub interval_ms: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self { interval_ms: 10_000 }
    }
}

/// Credential settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Token expected in the `token` cookie. When unset every credential is rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
