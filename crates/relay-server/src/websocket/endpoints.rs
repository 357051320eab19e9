//! WebSocket upgrade handlers.
//!
//! | Route              | Flow                                               |
//! |--------------------|----------------------------------------------------|
//! | `/ws`              | echo-and-heartbeat, or chat when `username` is set |
//! | `/chat/ws`         | chat, `username` defaults to `Anonymous`           |
//! | `/dependencies/ws` | greeting + echo-and-heartbeat, `token` cookie      |

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::debug;

use super::echo::{ACK_RECEIVED, ACK_TEXT_WAS};
use super::peer::WsPeer;
use super::session::{SessionPlan, reject_session, run_session};
use crate::auth::authorize;
use crate::server::AppState;

/// Cookie carrying the credential for `/dependencies/ws`.
pub const TOKEN_COOKIE: &str = "token";

/// Query parameters accepted by the WebSocket routes.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Display name.
    pub username: Option<String>,
}

/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let plan = match params.username {
        Some(username) => SessionPlan::BroadcastChat { username },
        None => SessionPlan::EchoHeartbeat {
            ack_prefix: ACK_RECEIVED,
            username: None,
            greet: false,
        },
    };
    accept(ws, state, plan)
}

/// `GET /chat/ws`
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let username = params
        .username
        .unwrap_or_else(|| state.config.default_username.clone());
    accept(ws, state, SessionPlan::BroadcastChat { username })
}

/// `GET /dependencies/ws`
///
/// The credential is checked before upgrading; a mismatch still completes
/// the upgrade so the client receives a 1008 close frame instead of an HTTP
/// error.
pub async fn dependencies_ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    jar: CookieJar,
    State(state): State<AppState>,
) -> Response {
    let token = jar.get(TOKEN_COOKIE).map(|c| c.value().to_owned());
    if authorize(state.verifier.as_ref(), token.as_deref()).is_err() {
        return ws.on_upgrade(move |socket| {
            state.shutdown.track(reject_session(WsPeer::new(socket)))
        });
    }

    let username = params
        .username
        .unwrap_or_else(|| state.config.default_username.clone());
    accept(
        ws,
        state,
        SessionPlan::EchoHeartbeat {
            ack_prefix: ACK_TEXT_WAS,
            username: Some(username),
            greet: true,
        },
    )
}

fn accept(ws: WebSocketUpgrade, state: AppState, plan: SessionPlan) -> Response {
    debug!(?plan, "upgrading connection");
    let ctx = state.session_context();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            state
                .shutdown
                .track(run_session(WsPeer::new(socket), plan, ctx))
        })
}
