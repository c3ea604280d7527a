//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! WebSocket transport integration tests against a local echo server.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use umicp::error::ErrorCode;
use umicp::protocol::Protocol;
use umicp::transport::{Transport, TransportConfig, WebSocketTransport};
use umicp::types::OperationType;

/// Binds a localhost WebSocket echo server and returns its port. The server
/// echoes every binary/text message back to the sender until the client
/// closes.
async fn spawn_echo_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(websocket) = accept_async(stream).await else {
                    return;
                };
                let (mut sink, mut source) = websocket.split();
                while let Some(Ok(message)) = source.next().await {
                    match message {
                        Message::Binary(_) | Message::Text(_) => {
                            if sink.send(message).await.is_err() {
                                break;
                            }
                        }
                        Message::Ping(payload) => {
                            let _ = sink.send(Message::Pong(payload)).await;
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            });
        }
    });
    port
}

fn client_config(port: u16) -> TransportConfig {
    TransportConfig::websocket("127.0.0.1", port)
        .with_connection_timeout(Duration::from_secs(5))
        .with_heartbeat_interval(Duration::from_secs(30))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn connect_send_receive_disconnect() {
    let port = spawn_echo_server().await;
    let transport = WebSocketTransport::new(client_config(port));

    let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = Arc::clone(&received);
    transport.set_message_callback(Some(Arc::new(move |data: &[u8]| {
        sink.lock().push(data.to_vec());
    })));

    transport.connect().await.unwrap();
    assert!(transport.is_connected());

    transport.send(b"round trip").await.unwrap();
    settle().await;

    {
        let messages = received.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], b"round trip");
    }

    let stats = transport.stats();
    assert_eq!(stats.messages_sent, 1);
    assert_eq!(stats.bytes_sent, 10);
    assert_eq!(stats.messages_received, 1);
    assert_eq!(stats.connection_count, 1);

    transport.disconnect().await.unwrap();
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn connect_is_idempotent() {
    let port = spawn_echo_server().await;
    let transport = WebSocketTransport::new(client_config(port));

    transport.connect().await.unwrap();
    transport.connect().await.unwrap();
    assert_eq!(transport.stats().connection_count, 1);

    transport.disconnect().await.unwrap();
    transport.disconnect().await.unwrap();
}

#[tokio::test]
async fn connection_callback_reports_transitions() {
    let port = spawn_echo_server().await;
    let transport = WebSocketTransport::new(client_config(port));

    let events = Arc::new(Mutex::new(Vec::<bool>::new()));
    let sink = Arc::clone(&events);
    transport.set_connection_callback(Some(Arc::new(move |connected, _reason: &str| {
        sink.lock().push(connected);
    })));

    transport.connect().await.unwrap();
    transport.disconnect().await.unwrap();
    settle().await;

    let seen = events.lock();
    assert_eq!(seen.first(), Some(&true));
    assert_eq!(seen.last(), Some(&false));
}

#[tokio::test]
async fn wire_order_matches_call_order() {
    let port = spawn_echo_server().await;
    let transport = WebSocketTransport::new(client_config(port));

    let received = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = Arc::clone(&received);
    transport.set_message_callback(Some(Arc::new(move |data: &[u8]| {
        sink.lock().push(data.to_vec());
    })));

    transport.connect().await.unwrap();
    for index in 0u32..50 {
        transport.send(&index.to_le_bytes()).await.unwrap();
    }

    // Wait for all echoes.
    for _ in 0..100 {
        if received.lock().len() == 50 {
            break;
        }
        settle().await;
    }

    let messages = received.lock();
    assert_eq!(messages.len(), 50);
    for (index, message) in messages.iter().enumerate() {
        assert_eq!(message, &(index as u32).to_le_bytes());
    }
    drop(messages);
    transport.disconnect().await.unwrap();
}

#[tokio::test]
async fn endpoint_change_requires_disconnect() {
    let port = spawn_echo_server().await;
    let transport = WebSocketTransport::new(client_config(port));
    transport.connect().await.unwrap();

    // Mutable fields may change while connected.
    let tweaked = client_config(port).with_max_payload_size(2048);
    transport.configure(tweaked).await.unwrap();

    // Endpoint fields may not.
    let moved = TransportConfig::websocket("127.0.0.1", port + 1);
    let error = transport.configure(moved).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::NetworkError);

    transport.disconnect().await.unwrap();
    transport
        .configure(TransportConfig::websocket("127.0.0.1", port))
        .await
        .unwrap();
}

#[tokio::test]
async fn orchestrator_over_websocket_round_trips_envelopes_and_frames() {
    let port = spawn_echo_server().await;
    let protocol = Protocol::new("ws-node").unwrap();
    protocol.set_transport(Arc::new(WebSocketTransport::new(client_config(port))));

    let controls = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&controls);
    protocol.register_handler(
        OperationType::Control,
        Arc::new(move |envelope, _| {
            let command = envelope
                .capabilities
                .as_ref()
                .and_then(|caps| caps.get("command"))
                .cloned()
                .unwrap_or_default();
            sink.lock().push(command);
        }),
    );

    let frames = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = Arc::clone(&frames);
    protocol.register_handler(
        OperationType::Data,
        Arc::new(move |_, payload| {
            sink.lock().push(payload.unwrap().to_vec());
        }),
    );

    protocol.connect().await.unwrap();
    assert!(protocol.is_connected());

    // The echo server bounces our own messages back at us.
    protocol
        .send_control("ws-node", OperationType::Control, "status", None)
        .await
        .unwrap();
    protocol.send_data("ws-node", b"binary body", None).await.unwrap();
    settle().await;
    settle().await;

    assert_eq!(*controls.lock(), vec!["status".to_string()]);
    assert_eq!(*frames.lock(), vec![b"binary body".to_vec()]);

    let stats = protocol.stats();
    assert_eq!(stats.messages_sent, 2);
    assert_eq!(stats.messages_received, 2);

    protocol.disconnect().await.unwrap();
}

#[tokio::test]
async fn connect_to_closed_port_fails_with_network_error() {
    // Bind a listener and drop it so the port is closed.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let transport = WebSocketTransport::new(client_config(port));
    let error = transport.connect().await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::NetworkError);
    assert!(!transport.is_connected());
}
