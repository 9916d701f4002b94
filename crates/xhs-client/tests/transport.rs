//! Integration tests for the WebSocket transport against a local server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use xhs_client::transport::connect;
use xhs_client::{ClientConfig, ClientId, ConnectionState, ServerEvent, TransportEvent};

const WAIT: Duration = Duration::from_secs(5);

async fn next_event(rx: &mut UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("transport channel closed")
}

async fn wait_for_state(rx: &mut UnboundedReceiver<TransportEvent>, wanted: ConnectionState) {
    loop {
        if next_event(rx).await == TransportEvent::Status(wanted) {
            return;
        }
    }
}

#[tokio::test]
async fn delivers_frames_and_sends_when_open() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        for frame in [
            r#"{"type":"heartbeat"}"#,
            "not json at all",
            r#"{"type":"chat_response","content":"你好","message_type":"chat"}"#,
        ] {
            ws.send(Message::Text(frame.to_owned().into())).await.unwrap();
        }
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
                Some(Ok(_)) => continue,
                other => panic!("client went away: {other:?}"),
            }
        }
    });

    let config = ClientConfig::new().with_base_url(format!("http://{addr}"));
    let (handle, mut events) = connect(&config, &ClientId::new("abc")).unwrap();

    wait_for_state(&mut events, ConnectionState::Open).await;
    assert!(handle.state().is_open());

    // The unknown and malformed frames are dropped without an event.
    match next_event(&mut events).await {
        TransportEvent::Server(ServerEvent::ChatResponse { content, message_type }) => {
            assert_eq!(content, json!("你好"));
            assert_eq!(message_type.as_deref(), Some("chat"));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(handle.send(&json!({"type": "ping"})));
    let received = tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
    assert_eq!(received, r#"{"type":"ping"}"#);

    handle.shutdown().await;
}

#[tokio::test]
async fn gives_up_after_bounded_retries() {
    // Reserve a port, then free it so every connect is refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new()
        .with_base_url(format!("http://{addr}"))
        .with_max_reconnect_attempts(2)
        .with_reconnect_delay_ms(10);
    let (handle, mut events) = connect(&config, &ClientId::new("abc")).unwrap();

    let mut retries = Vec::new();
    loop {
        match next_event(&mut events).await {
            TransportEvent::Status(ConnectionState::Retrying { attempt }) => retries.push(attempt),
            TransportEvent::Status(ConnectionState::Exhausted) => break,
            TransportEvent::Status(ConnectionState::Open) => panic!("nothing should be listening"),
            _ => {}
        }
    }
    assert_eq!(retries, [1, 2]);
    assert_eq!(handle.state(), ConnectionState::Exhausted);
    assert!(!handle.send(&json!({"type": "ping"})));
}

#[tokio::test]
async fn reconnects_after_server_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // First connection is closed right away; the second stays up.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let config = ClientConfig::new()
        .with_base_url(format!("http://{addr}"))
        .with_reconnect_delay_ms(10);
    let (handle, mut events) = connect(&config, &ClientId::new("abc")).unwrap();

    wait_for_state(&mut events, ConnectionState::Open).await;
    wait_for_state(&mut events, ConnectionState::Retrying { attempt: 1 }).await;
    wait_for_state(&mut events, ConnectionState::Open).await;

    handle.shutdown().await;
}
