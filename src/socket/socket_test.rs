use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use super::*;
use crate::error::Error;

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_registry_dispatches_to_every_handler() {
    let registry = EventRegistry::default();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let calls = Arc::clone(&calls);
        registry.on(
            "new-producer",
            Arc::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }),
        );
    }

    let handled = registry.dispatch("new-producer", &json!({"producerId": "p1"}));
    assert_eq!(handled, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    assert_eq!(registry.dispatch("unknown", &Value::Null), 0);
}

#[test]
fn test_registry_off_removes_only_that_event() {
    let registry = EventRegistry::default();
    registry.on("a", Arc::new(|_| {}));
    registry.on("b", Arc::new(|_| {}));

    registry.off("a");
    assert_eq!(registry.dispatch("a", &Value::Null), 0);
    assert_eq!(registry.dispatch("b", &Value::Null), 1);

    registry.off_all();
    assert_eq!(registry.dispatch("b", &Value::Null), 0);
}

#[test]
fn test_invalid_url_is_rejected() {
    assert!(matches!(
        WebSocketManager::new("http://example.com", SocketConfig::default()),
        Err(Error::ErrInvalidSocketUrl)
    ));
    assert!(matches!(
        WebSocketManager::new("not a url", SocketConfig::default()),
        Err(Error::ErrInvalidSocketUrl)
    ));
    assert!(WebSocketManager::new("ws://example.com", SocketConfig::default()).is_ok());
}

#[tokio::test]
async fn test_emit_before_connect_fails() {
    let socket = WebSocketManager::new("ws://127.0.0.1:9", SocketConfig::default()).unwrap();
    let result = socket.emit("pauseProducerMedia", json!({})).await;
    assert!(matches!(result, Err(Error::ErrSocketNotConnected)));
    assert_eq!(socket.connection_state(), ConnectionState::New);
}

/// Accepts one client. Frames carrying an ack id are answered with
/// `{"ack": id, "data": {"ok": true, "event": <event>}}`; everything else is
/// swallowed.
async fn spawn_ack_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    if let Some(ack) = frame.get("ack") {
                        let reply = json!({
                            "ack": ack,
                            "data": {"ok": true, "event": frame["event"]},
                        });
                        ws.send(Message::text(reply.to_string())).await.unwrap();
                    }
                }
            });
        }
    });

    format!("ws://{addr}")
}

/// Accepts one client, pushes a single event frame, then idles.
async fn spawn_push_server(event_frame: Value) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::text(event_frame.to_string())).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        }
    });

    format!("ws://{addr}")
}

#[tokio::test]
async fn test_connect_and_emit_with_ack() {
    init_log();
    let url = spawn_ack_server().await;
    let socket = WebSocketManager::new(&url, SocketConfig::default()).unwrap();

    socket.connect().await.unwrap();
    assert!(socket.is_connected());

    // The writer is installed before connect() returns, so an emit issued
    // straight away must not see a half-open socket.
    socket
        .emit("updateMediaSettings", json!({"audio": true}))
        .await
        .unwrap();

    let reply = socket
        .emit_with_ack("joinRoom", json!({"roomName": "room-1"}))
        .await
        .unwrap();
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["event"], "joinRoom");
}

#[tokio::test]
async fn test_connect_error_enters_failed_state() {
    init_log();
    // Port 9 (discard) refuses the handshake.
    let socket = WebSocketManager::new("ws://127.0.0.1:9", SocketConfig::default()).unwrap();

    assert!(socket.connect().await.is_err());
    assert_eq!(socket.connection_state(), ConnectionState::Failed);
    assert!(!socket.is_connected());
}

#[tokio::test]
async fn test_ack_timeout() {
    init_log();
    // Push server never answers acks.
    let url = spawn_push_server(json!({"event": "noop"})).await;
    let config = SocketConfig {
        ack_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let socket = WebSocketManager::new(&url, config).unwrap();

    socket.connect().await.unwrap();
    let result = socket.emit_with_ack("consumer-resume", json!({})).await;
    assert!(matches!(result, Err(Error::ErrSocketTimeout)));
}

#[tokio::test]
async fn test_server_event_reaches_handler() {
    let url = spawn_push_server(json!({
        "event": "new-producer",
        "data": {"producerId": "p1", "kind": "video"},
    }))
    .await;

    let socket = WebSocketManager::new(&url, SocketConfig::default()).unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    socket.on(
        "new-producer",
        Arc::new(move |data| {
            let _ = tx.send(data);
        }),
    );

    socket.connect().await.unwrap();

    let data = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within deadline")
        .expect("event payload");
    assert_eq!(data["producerId"], "p1");
    assert_eq!(data["kind"], "video");
}

#[tokio::test]
async fn test_disconnect_is_terminal_for_emits() {
    let url = spawn_ack_server().await;
    let socket = WebSocketManager::new(&url, SocketConfig::default()).unwrap();

    socket.connect().await.unwrap();
    socket.disconnect().await.unwrap();

    assert_eq!(socket.connection_state(), ConnectionState::Disconnected);
    assert!(!socket.is_connected());

    let result = socket.emit("pauseProducerMedia", json!({})).await;
    assert!(matches!(result, Err(Error::ErrSocketNotConnected)));
}
