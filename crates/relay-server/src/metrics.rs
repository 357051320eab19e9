//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter, labels: flow).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket disconnections total (counter, labels: outcome).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Connections refused by credential check (counter).
pub const WS_AUTH_REJECTIONS_TOTAL: &str = "ws_auth_rejections_total";
/// Connection lifetime in seconds (histogram, labels: flow).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Chat events published to the broker (counter).
pub const CHAT_MESSAGES_PUBLISHED_TOTAL: &str = "chat_messages_published_total";
/// Chat events forwarded to a peer (counter).
pub const CHAT_MESSAGES_DELIVERED_TOTAL: &str = "chat_messages_delivered_total";
/// Chat events discarded because the receiver published them (counter).
pub const CHAT_SELF_FILTERED_TOTAL: &str = "chat_self_filtered_total";
/// Echo acknowledgments sent (counter).
pub const ECHO_REPLIES_TOTAL: &str = "echo_replies_total";
/// Current-time notices sent (counter).
pub const HEARTBEAT_NOTICES_TOTAL: &str = "heartbeat_notices_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_DISCONNECTIONS_TOTAL,
            WS_AUTH_REJECTIONS_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
            CHAT_MESSAGES_PUBLISHED_TOTAL,
            CHAT_MESSAGES_DELIVERED_TOTAL,
            CHAT_SELF_FILTERED_TOTAL,
            ECHO_REPLIES_TOTAL,
            HEARTBEAT_NOTICES_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
