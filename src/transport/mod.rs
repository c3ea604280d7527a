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

//! Transport abstraction.
//!
//! A transport represents one client-side connection to one remote endpoint
//! and exposes a uniform capability set: connect, disconnect, send (bytes,
//! envelope, or frame), callback registration, and statistics. Concrete kinds
//! plug in behind the [`Transport`] trait; [`create_transport`] dispatches at
//! the factory boundary.
//!
//! # Scheduling model
//!
//! Each transport instance owns one internal I/O task that drains the
//! outbound queue, reads inbound bytes, and delivers completed messages via
//! the message callback. Callbacks may therefore be invoked from the I/O
//! task. Callback slots live behind a mutex so they can be replaced
//! concurrently; invocation always happens after the slot lock is released,
//! so user code never runs while a transport-internal lock is held.

pub mod config;
pub mod memory;
pub mod websocket;

pub use config::TransportConfig;
pub use memory::MemoryTransport;
pub use websocket::WebSocketTransport;

use crate::envelope::Envelope;
use crate::error::{ErrorCode, ProtocolError, Result};
use crate::frame::Frame;
use crate::serialization::{binary, json};
use crate::stats::StatsSnapshot;
use crate::types::TransportKind;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Callback invoked with each completed inbound message.
pub type MessageCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Callback invoked on connection transitions with `(connected, reason)`.
/// The reason is empty on successful connection.
pub type ConnectionCallback = Arc<dyn Fn(bool, &str) + Send + Sync>;

/// Callback invoked on transport errors with the wire-level error kind and a
/// human-readable message.
pub type ErrorCallback = Arc<dyn Fn(ErrorCode, &str) + Send + Sync>;

/// Connection lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and no connection attempt in progress.
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Connected; sends are accepted.
    Connected,
    /// Teardown in progress.
    Closing,
}

/// Uniform capability set of a connection endpoint.
///
/// Implementations: [`WebSocketTransport`] (stream-framed over TCP/TLS) and
/// [`MemoryTransport`] (in-process pair for tests). The HTTP/2 kind is part
/// of the [`TransportKind`] vocabulary but has no bundled implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes the connection.
    ///
    /// Idempotent: succeeds without side effects when already connected.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NetworkError`] when the endpoint is
    /// unreachable or the transport is mid-transition, and
    /// [`ProtocolError::Timeout`] when the handshake exceeds the configured
    /// connection timeout.
    async fn connect(&self) -> Result<()>;

    /// Tears the connection down, stopping and joining the I/O task.
    ///
    /// Idempotent: succeeds without side effects when already disconnected.
    async fn disconnect(&self) -> Result<()>;

    /// Returns `true` while the transport is connected.
    fn is_connected(&self) -> bool;

    /// Sends one wire message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NetworkError`] if not connected and
    /// [`ProtocolError::InvalidArgument`] for an empty buffer.
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Serializes and sends an envelope.
    async fn send_envelope(&self, envelope: &Envelope) -> Result<()> {
        let bytes = json::serialize_envelope(envelope)?;
        self.send(&bytes).await
    }

    /// Serializes and sends a frame, honoring the configured payload limit.
    async fn send_frame(&self, frame: &Frame) -> Result<()> {
        let limit = self.config().max_payload_size;
        let bytes = binary::encode_frame_with_limit(frame, limit)?;
        self.send(&bytes).await
    }

    /// Applies a new configuration.
    ///
    /// Mutable fields (limits, timeouts) may change at any time; endpoint
    /// fields require a disconnect first.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NetworkError`] when an endpoint change is
    /// attempted while connected.
    async fn configure(&self, config: TransportConfig) -> Result<()>;

    /// Returns a copy of the active configuration.
    fn config(&self) -> TransportConfig;

    /// Replaces the message callback; `None` drops inbound messages.
    fn set_message_callback(&self, callback: Option<MessageCallback>);

    /// Replaces the connection callback; `None` drops transition events.
    fn set_connection_callback(&self, callback: Option<ConnectionCallback>);

    /// Replaces the error callback; `None` drops error events.
    fn set_error_callback(&self, callback: Option<ErrorCallback>);

    /// Returns a consistent snapshot of the transport statistics.
    fn stats(&self) -> StatsSnapshot;

    /// Zeroes the statistics counters.
    fn reset_stats(&self);

    /// Returns the transport kind.
    fn kind(&self) -> TransportKind;

    /// Returns the endpoint in human-readable URL form.
    fn endpoint(&self) -> String;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("kind", &self.kind())
            .field("endpoint", &self.endpoint())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Creates a transport for the configured kind.
///
/// # Errors
///
/// Returns [`ProtocolError::NotImplemented`] for [`TransportKind::Http2`]
/// (declared in the wire vocabulary, no bundled implementation) and
/// [`ProtocolError::InvalidArgument`] for [`TransportKind::Direct`]
/// (in-process transports are created in pairs via
/// [`MemoryTransport::pair`]).
///
/// # Examples
///
/// ```rust
/// use umicp::transport::{create_transport, TransportConfig};
///
/// let transport = create_transport(TransportConfig::websocket("localhost", 8080)).unwrap();
/// assert_eq!(transport.endpoint(), "ws://localhost:8080/");
/// ```
pub fn create_transport(config: TransportConfig) -> Result<Arc<dyn Transport>> {
    config.validate()?;
    match config.kind {
        TransportKind::WebSocket => Ok(Arc::new(WebSocketTransport::new(config))),
        TransportKind::Http2 => Err(ProtocolError::NotImplemented {
            feature: "http2 transport".to_string(),
        }),
        TransportKind::Direct => Err(ProtocolError::invalid_argument(
            "direct transports are created in pairs via MemoryTransport::pair",
        )),
    }
}

/// Replaceable callback slots shared between a transport and its I/O task.
///
/// Each `emit_*` method clones the callback out of its slot and releases the
/// lock before invoking it, so user code can call back into the transport
/// without deadlocking.
#[derive(Default)]
pub(crate) struct CallbackSlots {
    message: Mutex<Option<MessageCallback>>,
    connection: Mutex<Option<ConnectionCallback>>,
    error: Mutex<Option<ErrorCallback>>,
}

impl CallbackSlots {
    pub(crate) fn set_message(&self, callback: Option<MessageCallback>) {
        *self.message.lock() = callback;
    }

    pub(crate) fn set_connection(&self, callback: Option<ConnectionCallback>) {
        *self.connection.lock() = callback;
    }

    pub(crate) fn set_error(&self, callback: Option<ErrorCallback>) {
        *self.error.lock() = callback;
    }

    pub(crate) fn emit_message(&self, data: &[u8]) {
        let callback = self.message.lock().clone();
        if let Some(callback) = callback {
            callback(data);
        }
    }

    pub(crate) fn emit_connection(&self, connected: bool, reason: &str) {
        let callback = self.connection.lock().clone();
        if let Some(callback) = callback {
            callback(connected, reason);
        }
    }

    pub(crate) fn emit_error(&self, code: ErrorCode, message: &str) {
        let callback = self.error.lock().clone();
        if let Some(callback) = callback {
            callback(code, message);
        }
    }
}
