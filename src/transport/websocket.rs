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

//! WebSocket transport implementation.
//!
//! One wire message corresponds to one WebSocket message; the transport never
//! re-delimits. Each instance owns a single I/O task that drains the outbound
//! queue, delivers inbound messages to the message callback, and emits
//! periodic pings at the configured heartbeat interval. The task is signalled
//! to stop and joined on [`disconnect`](crate::transport::Transport::disconnect).
//!
//! Instance state travels into the I/O task through its closure; there is no
//! process-wide state.

use crate::error::{ErrorCode, ProtocolError, Result};
use crate::stats::{StatsRecorder, StatsSnapshot};
use crate::transport::{
    CallbackSlots, ConnectionCallback, ConnectionState, ErrorCallback, MessageCallback, Transport,
    TransportConfig,
};
use crate::types::TransportKind;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// Depth of the outbound queue between callers and the I/O task. Sends block
/// once the queue is full until the I/O task drains it.
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Client-side WebSocket transport.
///
/// # Examples
///
/// ```rust,no_run
/// use umicp::transport::{Transport, TransportConfig, WebSocketTransport};
///
/// # async fn example() -> umicp::error::Result<()> {
/// let transport = WebSocketTransport::new(TransportConfig::websocket("localhost", 8080));
/// transport.connect().await?;
/// transport.send(b"{\"version\":\"1.0\"}").await?;
/// transport.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct WebSocketTransport {
    inner: Arc<Inner>,
}

struct Inner {
    config: RwLock<TransportConfig>,
    state: Mutex<ConnectionState>,
    callbacks: CallbackSlots,
    stats: StatsRecorder,
    io: AsyncMutex<Option<IoHandle>>,
}

struct IoHandle {
    outbound: mpsc::Sender<Vec<u8>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Creates a disconnected transport for the given configuration.
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                state: Mutex::new(ConnectionState::Idle),
                callbacks: CallbackSlots::default(),
                stats: StatsRecorder::new(),
                io: AsyncMutex::new(None),
            }),
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => {
                    return Err(ProtocolError::network("connection attempt in progress"));
                }
                ConnectionState::Closing => {
                    return Err(ProtocolError::network("transport is closing"));
                }
                ConnectionState::Idle => *state = ConnectionState::Connecting,
            }
        }

        let config = self.inner.config.read().clone();
        let url = config.endpoint_url();
        debug!(endpoint = %url, "connecting");

        let handshake =
            tokio::time::timeout(config.connection_timeout, connect_async(url.as_str())).await;
        let stream = match handshake {
            Err(_) => {
                *self.inner.state.lock() = ConnectionState::Idle;
                return Err(ProtocolError::Timeout {
                    duration: config.connection_timeout,
                });
            }
            Ok(Err(error)) => {
                *self.inner.state.lock() = ConnectionState::Idle;
                return Err(ProtocolError::network(format!(
                    "failed to connect to {url}: {error}"
                )));
            }
            Ok(Ok((stream, _response))) => stream,
        };

        // A disconnect during the handshake resets the state to Idle; honor it
        // instead of resurrecting the connection.
        {
            let mut state = self.inner.state.lock();
            if *state != ConnectionState::Connecting {
                return Err(ProtocolError::network("connection aborted"));
            }
            *state = ConnectionState::Connected;
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(io_loop(
            Arc::clone(&self.inner),
            stream,
            outbound_rx,
            shutdown_rx,
        ));
        *self.inner.io.lock().await = Some(IoHandle {
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            task,
        });

        self.inner.stats.record_connection();
        self.inner.callbacks.emit_connection(true, "");
        debug!(endpoint = %url, "connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let handle = self.inner.io.lock().await.take();
        let Some(handle) = handle else {
            let mut state = self.inner.state.lock();
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Idle;
            }
            return Ok(());
        };

        {
            let mut state = self.inner.state.lock();
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Closing;
            }
        }
        let _ = handle.shutdown.send(true);
        // The I/O task transitions to Idle and fires the connection callback.
        let _ = handle.task.await;
        debug!("disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.inner.state.lock() == ConnectionState::Connected
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(ProtocolError::invalid_argument("data must not be empty"));
        }
        if !self.is_connected() {
            return Err(ProtocolError::network("transport not connected"));
        }

        let sender = self
            .inner
            .io
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.outbound.clone())
            .ok_or_else(|| ProtocolError::network("transport not connected"))?;

        sender
            .send(data.to_vec())
            .await
            .map_err(|_| ProtocolError::network("connection closed"))?;
        self.inner.stats.record_sent(data.len() as u64);
        Ok(())
    }

    async fn configure(&self, config: TransportConfig) -> Result<()> {
        config.validate()?;
        let active = *self.inner.state.lock() != ConnectionState::Idle;
        let mut current = self.inner.config.write();
        if active && !current.same_endpoint(&config) {
            return Err(ProtocolError::network(
                "disconnect before changing the endpoint",
            ));
        }
        *current = config;
        Ok(())
    }

    fn config(&self) -> TransportConfig {
        self.inner.config.read().clone()
    }

    fn set_message_callback(&self, callback: Option<MessageCallback>) {
        self.inner.callbacks.set_message(callback);
    }

    fn set_connection_callback(&self, callback: Option<ConnectionCallback>) {
        self.inner.callbacks.set_connection(callback);
    }

    fn set_error_callback(&self, callback: Option<ErrorCallback>) {
        self.inner.callbacks.set_error(callback);
    }

    fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.inner.stats.reset();
    }

    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn endpoint(&self) -> String {
        self.inner.config.read().endpoint_url()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.io.try_lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.shutdown.send(true);
                handle.task.abort();
            }
        }
    }
}

async fn io_loop(
    inner: Arc<Inner>,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let heartbeat = inner.config.read().heartbeat_interval;
    let (mut sink, mut source) = stream.split();
    let mut keepalive = tokio::time::interval_at(
        tokio::time::Instant::now() + heartbeat,
        heartbeat,
    );
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut close_reason = String::from("connection closed");
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                close_reason = "disconnect requested".to_string();
                break;
            }
            outgoing = outbound.recv() => match outgoing {
                Some(data) => {
                    if let Err(error) = sink.send(Message::Binary(data)).await {
                        warn!(%error, "write failed");
                        inner.stats.record_error();
                        inner
                            .callbacks
                            .emit_error(ErrorCode::NetworkError, &error.to_string());
                        close_reason = error.to_string();
                        break;
                    }
                }
                None => {
                    close_reason = "sender dropped".to_string();
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Binary(data))) => {
                    inner.stats.record_received(data.len() as u64);
                    inner.callbacks.emit_message(&data);
                }
                Some(Ok(Message::Text(text))) => {
                    inner.stats.record_received(text.len() as u64);
                    inner.callbacks.emit_message(text.as_bytes());
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) => {
                    close_reason = "closed by peer".to_string();
                    break;
                }
                Some(Err(error)) => {
                    warn!(%error, "read failed");
                    inner.stats.record_error();
                    inner
                        .callbacks
                        .emit_error(ErrorCode::NetworkError, &error.to_string());
                    close_reason = error.to_string();
                    break;
                }
                None => break,
            },
            _ = keepalive.tick() => {
                if let Err(error) = sink.send(Message::Ping(Vec::new())).await {
                    warn!(%error, "keepalive failed");
                    inner.stats.record_error();
                    close_reason = error.to_string();
                    break;
                }
            }
        }
    }

    let was_active = {
        let mut state = inner.state.lock();
        let was_active = *state != ConnectionState::Idle;
        *state = ConnectionState::Idle;
        was_active
    };
    if was_active {
        inner.callbacks.emit_connection(false, &close_reason);
    }
}
