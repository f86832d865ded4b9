//! Integration tests for the WebSocket host
//!
//! Tests the flow: WebSocket client -> /connect/{name} -> serve_port ->
//! background relay -> serve_port -> WebSocket client.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use relay_bridge::bridge::TabId;
use relay_bridge::web::{build_router, AppState};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::common::{background, eventually, within};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve a router whose ports hold at most `capacity` messages per direction.
async fn start_host(capacity: usize) -> (SocketAddr, AppState) {
    let (background, _) = background();
    let state = AppState::new(background, capacity);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    client
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        match client.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("socket ended: {other:?}"),
        }
    }
}

/// Both sides flood a small-capacity relay before reading anything; every
/// frame still arrives, in order, on the other socket.
#[tokio::test]
async fn test_simultaneous_floods_do_not_deadlock() {
    const FRAMES: usize = 40;
    let (addr, state) = start_host(2).await;

    let mut inspector = connect(addr, "/connect/7").await;
    let mut agent = connect(addr, "/connect/content-script?tab=7").await;
    let registry = state.background().registry().clone();
    assert!(eventually(|| registry.has_relay(TabId(7))).await);

    for i in 0..FRAMES {
        inspector
            .send(Message::Text(json!({ "from": "inspector", "seq": i }).to_string().into()))
            .await
            .unwrap();
        agent
            .send(Message::Text(json!({ "from": "agent", "seq": i }).to_string().into()))
            .await
            .unwrap();
    }

    for i in 0..FRAMES {
        assert_eq!(
            within(next_json(&mut agent)).await,
            json!({ "from": "inspector", "seq": i })
        );
    }
    for i in 0..FRAMES {
        assert_eq!(
            within(next_json(&mut inspector)).await,
            json!({ "from": "agent", "seq": i })
        );
    }
}

/// Closing one socket tears the pairing down and closes the other.
#[tokio::test]
async fn test_closing_a_socket_closes_its_peer() {
    let (addr, state) = start_host(8).await;

    let mut inspector = connect(addr, "/connect/8").await;
    let mut agent = connect(addr, "/connect/content-script?tab=8").await;
    let registry = state.background().registry().clone();
    assert!(eventually(|| registry.has_relay(TabId(8))).await);

    inspector.close(None).await.unwrap();

    within(async {
        loop {
            match agent.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(eventually(|| registry.tabs().is_empty()).await);
}
