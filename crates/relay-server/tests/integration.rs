//! End-to-end integration tests using real WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;
use relay_broker::{Broker, LocalBroker};
use relay_server::{RelayServer, ServerConfig, StaticTokenVerifier};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;

const TIMEOUT: Duration = Duration::from_secs(5);
const TOKEN: &str = "s3cret";

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Boot a test server on an ephemeral port.
async fn boot_server_with(config: ServerConfig) -> (SocketAddr, Arc<RelayServer>) {
    let metrics = PrometheusBuilder::new().build_recorder().handle();
    let server = Arc::new(RelayServer::new(
        config,
        Arc::new(LocalBroker::default()),
        Arc::new(StaticTokenVerifier::new(Some(TOKEN.into()))),
        metrics,
    ));
    let (addr, _handle) = server.start().await.unwrap();
    (addr, server)
}

async fn boot_server() -> (SocketAddr, Arc<RelayServer>) {
    boot_server_with(ServerConfig::default()).await
}

async fn connect(addr: SocketAddr, path: &str) -> WsStream {
    let (ws, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    ws
}

async fn connect_with_cookie(addr: SocketAddr, path: &str, cookie: &str) -> WsStream {
    let mut req = format!("ws://{addr}{path}").into_client_request().unwrap();
    let _ = req
        .headers_mut()
        .insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
    let (ws, _) = connect_async(req).await.unwrap();
    ws
}

async fn send(ws: &mut WsStream, text: &str) {
    ws.send(Message::text(text)).await.unwrap();
}

/// Next text frame, skipping control frames. Panics on close.
async fn next_text(ws: &mut WsStream) -> String {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for text")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return text.to_string(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("expected text, got {other:?}"),
        }
    }
}

/// Close code of the next non-control frame. Panics on text.
async fn next_close_code(ws: &mut WsStream) -> Option<u16> {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for close")?;
        match msg {
            Ok(Message::Close(frame)) => return frame.map(|f| u16::from(f.code)),
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(other) => panic!("expected close, got {other:?}"),
            Err(_) => return None,
        }
    }
}

async fn wait_for_subscribers(server: &RelayServer, n: usize) {
    timeout(TIMEOUT, async {
        while server.broker().subscriber_count("chat") != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscribers never settled");
}

// ── HTTP ────────────────────────────────────────────────────────────

#[tokio::test]
async fn home_returns_hello_world() {
    let (addr, _server) = boot_server().await;
    let body: Value = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"message": "Hello World"}));
}

#[tokio::test]
async fn health_counts_open_connections() {
    let (addr, server) = boot_server().await;
    let mut ws = connect(addr, "/chat/ws?username=alice").await;
    wait_for_subscribers(&server, 1).await;

    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["broker_connected"], true);
    assert_eq!(body["connections"], 1);

    ws.close(None).await.unwrap();
    wait_for_subscribers(&server, 0).await;
}

// ── Echo and heartbeat ──────────────────────────────────────────────

#[tokio::test]
async fn ws_without_username_echoes() {
    let (addr, _server) = boot_server().await;
    let mut ws = connect(addr, "/ws").await;

    send(&mut ws, "hi").await;
    assert_eq!(next_text(&mut ws).await, "Message received: hi");
    send(&mut ws, "again").await;
    assert_eq!(next_text(&mut ws).await, "Message received: again");
}

#[tokio::test]
async fn utf8_binary_frame_is_echoed_as_text() {
    let (addr, _server) = boot_server().await;
    let mut ws = connect(addr, "/ws").await;

    ws.send(Message::binary(b"hi".to_vec())).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "Message received: hi");
}

#[tokio::test]
async fn ping_and_non_utf8_binary_do_not_end_the_connection() {
    let (addr, _server) = boot_server().await;
    let mut ws = connect(addr, "/ws").await;

    ws.send(Message::Ping(b"ping".to_vec().into())).await.unwrap();
    ws.send(Message::binary(vec![0xff, 0xfe])).await.unwrap();
    send(&mut ws, "still here").await;
    assert_eq!(next_text(&mut ws).await, "Message received: still here");
}

#[tokio::test]
async fn abrupt_client_drop_deregisters_connection() {
    let (addr, server) = boot_server().await;
    let mut ws = connect(addr, "/ws").await;
    send(&mut ws, "hi").await;
    assert_eq!(next_text(&mut ws).await, "Message received: hi");
    assert_eq!(server.registry().len(), 1);

    drop(ws);
    timeout(TIMEOUT, async {
        while !server.registry().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connection never deregistered");
}

#[tokio::test]
async fn idle_ws_receives_time_notices() {
    let config = ServerConfig {
        heartbeat_interval_ms: 100,
        ..ServerConfig::default()
    };
    let (addr, _server) = boot_server_with(config).await;
    let mut ws = connect(addr, "/ws").await;

    let first = next_text(&mut ws).await;
    let second = next_text(&mut ws).await;
    assert!(first.starts_with("Current time: "), "got {first}");
    assert!(second.starts_with("Current time: "), "got {second}");
}

// ── Authenticated endpoint ──────────────────────────────────────────

#[tokio::test]
async fn wrong_token_is_closed_with_policy_violation_and_no_greeting() {
    let (addr, _server) = boot_server().await;
    let mut ws = connect_with_cookie(addr, "/dependencies/ws?username=mallory", "token=nope").await;
    assert_eq!(next_close_code(&mut ws).await, Some(1008));
}

#[tokio::test]
async fn missing_token_is_closed_with_policy_violation() {
    let (addr, _server) = boot_server().await;
    let mut ws = connect(addr, "/dependencies/ws").await;
    assert_eq!(next_close_code(&mut ws).await, Some(1008));
}

#[tokio::test]
async fn valid_token_greets_then_echoes() {
    let (addr, _server) = boot_server().await;
    let cookie = format!("token={TOKEN}");
    let mut ws = connect_with_cookie(addr, "/dependencies/ws?username=sam", &cookie).await;

    assert_eq!(next_text(&mut ws).await, "Hello, sam!");
    send(&mut ws, "ping").await;
    assert_eq!(next_text(&mut ws).await, "Message text was: ping");
}

#[tokio::test]
async fn valid_token_without_username_greets_anonymous() {
    let (addr, _server) = boot_server().await;
    let cookie = format!("token={TOKEN}");
    let mut ws = connect_with_cookie(addr, "/dependencies/ws", &cookie).await;
    assert_eq!(next_text(&mut ws).await, "Hello, Anonymous!");
}

// ── Broadcast chat ──────────────────────────────────────────────────

#[tokio::test]
async fn alice_reaches_bob_but_not_herself() {
    let (addr, server) = boot_server().await;
    let mut alice = connect(addr, "/ws?username=alice").await;
    let mut bob = connect(addr, "/chat/ws?username=bob").await;
    wait_for_subscribers(&server, 2).await;

    send(&mut alice, "hello").await;
    let delivered: Value = serde_json::from_str(&next_text(&mut bob).await).unwrap();
    assert_eq!(delivered, json!({"username": "alice", "message": "hello"}));

    let silent = timeout(Duration::from_millis(200), alice.next()).await;
    assert!(silent.is_err(), "alice received her own message");

    alice.close(None).await.unwrap();
    bob.close(None).await.unwrap();
    wait_for_subscribers(&server, 0).await;
}

#[tokio::test]
async fn anonymous_chat_clients_see_each_other() {
    let (addr, server) = boot_server().await;
    let mut first = connect(addr, "/chat/ws").await;
    let mut second = connect(addr, "/chat/ws").await;
    wait_for_subscribers(&server, 2).await;

    send(&mut first, "anyone?").await;
    let delivered: Value = serde_json::from_str(&next_text(&mut second).await).unwrap();
    assert_eq!(delivered["username"], "Anonymous");
    assert_eq!(delivered["message"], "anyone?");
}

// ── Shutdown ────────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_closes_clients_with_going_away() {
    let (addr, server) = boot_server().await;
    let mut echo = connect(addr, "/ws").await;
    let mut chat = connect(addr, "/chat/ws?username=bob").await;
    wait_for_subscribers(&server, 1).await;

    assert!(server.stop().await);
    assert_eq!(next_close_code(&mut echo).await, Some(1001));
    assert_eq!(next_close_code(&mut chat).await, Some(1001));
    assert!(!server.broker().is_connected());
}
