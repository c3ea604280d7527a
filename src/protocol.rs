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

//! Protocol orchestrator.
//!
//! [`Protocol`] owns a local identity, generates message ids, builds
//! envelopes and frames for the four outbound operations, dispatches inbound
//! messages to registered handlers by operation kind, and aggregates
//! statistics. It holds one transport plus an optional security manager.
//!
//! The orchestrator is callable from any thread: it is a cheap [`Clone`]
//! around shared state, and all mutation goes through interior locks that are
//! never held while user code runs.

use crate::compression::{self, CompressionAlgorithm};
use crate::envelope::{generate_message_id, timestamp_now, Envelope};
use crate::error::{ErrorCode, ProtocolError, Result};
use crate::frame::{Frame, FrameFlags};
use crate::security::SecurityManager;
use crate::serialization::{binary, json, WireMessage};
use crate::stats::{StatsRecorder, StatsSnapshot};
use crate::transport::Transport;
use crate::types::{OperationType, PayloadHint, ProtocolConfig, FRAME_HEADER_SIZE};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Handler invoked for each dispatched inbound message. The payload argument
/// is present for binary frames and absent for JSON envelopes.
pub type MessageHandler = Arc<dyn Fn(&Envelope, Option<&[u8]>) + Send + Sync>;

/// The protocol orchestrator.
///
/// # Examples
///
/// ```rust
/// use umicp::protocol::Protocol;
/// use umicp::transport::MemoryTransport;
/// use umicp::types::OperationType;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> umicp::error::Result<()> {
/// let (local, _remote) = MemoryTransport::pair();
/// let protocol = Protocol::new("node-a")?;
/// protocol.set_transport(Arc::new(local));
/// protocol.register_handler(
///     OperationType::Data,
///     Arc::new(|envelope, payload| {
///         println!("data from {}: {:?}", envelope.from, payload);
///     }),
/// );
/// protocol.connect().await?;
/// let msg_id = protocol
///     .send_control("node-b", OperationType::Control, "ping", None)
///     .await?;
/// # let _ = msg_id;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Protocol {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("local_id", &self.inner.local_id)
            .finish()
    }
}

struct Inner {
    local_id: String,
    config: RwLock<ProtocolConfig>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    security: RwLock<Option<Arc<dyn SecurityManager>>>,
    handlers: RwLock<HashMap<OperationType, MessageHandler>>,
    stats: StatsRecorder,
    next_stream_id: AtomicU64,
}

impl Protocol {
    /// Creates an orchestrator with the given local identity and default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] for an empty id.
    pub fn new(local_id: impl Into<String>) -> Result<Self> {
        let local_id = local_id.into();
        if local_id.is_empty() {
            return Err(ProtocolError::invalid_argument(
                "local_id must not be empty",
            ));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                local_id,
                config: RwLock::new(ProtocolConfig::default()),
                transport: RwLock::new(None),
                security: RwLock::new(None),
                handlers: RwLock::new(HashMap::new()),
                stats: StatsRecorder::new(),
                next_stream_id: AtomicU64::new(1),
            }),
        })
    }

    /// Returns the local logical id.
    #[must_use]
    pub fn local_id(&self) -> &str {
        &self.inner.local_id
    }

    /// Applies a new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] if `max_message_size`,
    /// `connection_timeout_ms`, or `heartbeat_interval_ms` is zero, or the
    /// version string is empty.
    pub fn configure(&self, config: ProtocolConfig) -> Result<()> {
        if config.max_message_size == 0 {
            return Err(ProtocolError::invalid_argument(
                "max_message_size must be greater than 0",
            ));
        }
        if config.connection_timeout_ms == 0 {
            return Err(ProtocolError::invalid_argument(
                "connection_timeout must be greater than 0",
            ));
        }
        if config.heartbeat_interval_ms == 0 {
            return Err(ProtocolError::invalid_argument(
                "heartbeat_interval must be greater than 0",
            ));
        }
        if config.version.is_empty() {
            return Err(ProtocolError::invalid_argument(
                "version must not be empty",
            ));
        }
        *self.inner.config.write() = config;
        Ok(())
    }

    /// Returns a copy of the active configuration.
    #[must_use]
    pub fn config(&self) -> ProtocolConfig {
        self.inner.config.read().clone()
    }

    /// Attaches the transport this orchestrator sends and receives through.
    pub fn set_transport(&self, transport: Arc<dyn Transport>) {
        *self.inner.transport.write() = Some(transport);
    }

    /// Installs the orchestrator's callbacks on the attached transport and
    /// connects it.
    ///
    /// The message, connection, and error callbacks are installed before the
    /// connection attempt so no early inbound message is lost.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NetworkError`] when no transport is attached,
    /// plus any error from the transport's own `connect`.
    pub async fn connect(&self) -> Result<()> {
        let transport = self.transport()?;

        let receiver = self.clone();
        transport.set_message_callback(Some(Arc::new(move |data: &[u8]| {
            if let Err(error) = receiver.process_message(data) {
                debug!(%error, "inbound message dropped");
            }
        })));

        let observer = self.clone();
        transport.set_connection_callback(Some(Arc::new(move |connected, reason: &str| {
            if connected {
                debug!(local_id = %observer.inner.local_id, "transport connected");
            } else {
                debug!(local_id = %observer.inner.local_id, reason, "transport disconnected");
            }
        })));

        let counter = self.clone();
        transport.set_error_callback(Some(Arc::new(move |code: ErrorCode, message: &str| {
            counter.inner.stats.record_error();
            warn!(?code, message, "transport error");
        })));

        transport.connect().await
    }

    /// Disconnects the attached transport.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NetworkError`] when no transport is attached.
    pub async fn disconnect(&self) -> Result<()> {
        self.transport()?.disconnect().await
    }

    /// Returns `true` while the attached transport is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner
            .transport
            .read()
            .as_ref()
            .is_some_and(|transport| transport.is_connected())
    }

    /// Sends a control message and returns the assigned message id.
    ///
    /// The command lands in the envelope's capabilities under `command`, with
    /// `params` alongside it when present. The configured preferred format is
    /// carried as the envelope's `accept` hint.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] for an empty recipient or
    /// command, and [`ProtocolError::NetworkError`] when no connected
    /// transport is available.
    pub async fn send_control(
        &self,
        to: &str,
        op: OperationType,
        command: &str,
        params: Option<&str>,
    ) -> Result<String> {
        if to.is_empty() {
            return Err(ProtocolError::invalid_argument("'to' must not be empty"));
        }
        if command.is_empty() {
            return Err(ProtocolError::invalid_argument(
                "command must not be empty",
            ));
        }

        let mut capabilities = BTreeMap::new();
        capabilities.insert("command".to_string(), command.to_string());
        if let Some(params) = params {
            if !params.is_empty() {
                capabilities.insert("params".to_string(), params.to_string());
            }
        }

        let preferred = self.inner.config.read().preferred_format;
        let envelope = self
            .envelope_builder(to, op)
            .capabilities(capabilities)
            .accept(vec![preferred.name().to_string()])
            .build()?;
        self.dispatch_envelope(envelope).await
    }

    /// Sends binary data as a frame and returns the assigned message id.
    ///
    /// Each call consumes one stream id (starting at 1) with sequence 0. When
    /// compression is enabled and the payload clears the threshold, the
    /// payload is gzip-compressed and the frame carries
    /// [`FrameFlags::COMPRESSED_GZIP`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] for an empty recipient,
    /// empty data, or when binary traffic is disabled;
    /// [`ProtocolError::BufferOverflow`] when the payload exceeds
    /// `max_message_size`; and [`ProtocolError::NetworkError`] when no
    /// connected transport is available.
    pub async fn send_data(
        &self,
        to: &str,
        data: &[u8],
        hint: Option<PayloadHint>,
    ) -> Result<String> {
        if to.is_empty() {
            return Err(ProtocolError::invalid_argument("'to' must not be empty"));
        }
        if data.is_empty() {
            return Err(ProtocolError::invalid_argument("data must not be empty"));
        }

        let config = self.inner.config.read().clone();
        if data.len() > config.max_message_size {
            return Err(ProtocolError::BufferOverflow {
                size: data.len(),
                max: config.max_message_size,
            });
        }
        if !config.enable_binary {
            return Err(ProtocolError::invalid_argument(
                "binary frames are disabled by configuration",
            ));
        }

        let transport = self.connected_transport()?;
        self.check_security_requirements(&config)?;

        let mut flags = FrameFlags::empty();
        let mut payload = data.to_vec();
        if config.enable_compression
            && compression::should_compress(
                data,
                config.compression_threshold,
                CompressionAlgorithm::Gzip,
            )
        {
            payload = compression::compress(
                data,
                CompressionAlgorithm::Gzip,
                compression::DEFAULT_COMPRESSION_LEVEL,
            )?;
            flags = flags.with(FrameFlags::COMPRESSED_GZIP);
        }

        let stream_id = self.inner.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::builder()
            .operation(OperationType::Data)
            .flags(flags)
            .stream_id(stream_id)
            .sequence(0)
            .payload(payload)
            .build()?;

        if let Some(hint) = &hint {
            debug!(?hint, stream_id, "sending data frame");
        }

        let bytes = binary::encode_frame_with_limit(&frame, config.max_message_size)?;
        transport.send(&bytes).await?;
        self.inner
            .stats
            .record_sent((frame.payload.len() + FRAME_HEADER_SIZE) as u64);
        Ok(generate_message_id())
    }

    /// Acknowledges a previously received message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] for an empty recipient or
    /// message id, and [`ProtocolError::NetworkError`] when no connected
    /// transport is available.
    pub async fn send_ack(&self, to: &str, original_msg_id: &str) -> Result<String> {
        if to.is_empty() {
            return Err(ProtocolError::invalid_argument("'to' must not be empty"));
        }
        if original_msg_id.is_empty() {
            return Err(ProtocolError::invalid_argument(
                "original message id must not be empty",
            ));
        }

        let mut reference = BTreeMap::new();
        reference.insert("message_id".to_string(), original_msg_id.to_string());
        reference.insert("status".to_string(), "OK".to_string());

        let envelope = self
            .envelope_builder(to, OperationType::Ack)
            .payload_ref(reference)
            .build()?;
        self.dispatch_envelope(envelope).await
    }

    /// Reports an error to the peer, optionally correlated to the message
    /// that caused it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] for an empty recipient and
    /// [`ProtocolError::NetworkError`] when no connected transport is
    /// available.
    pub async fn send_error(
        &self,
        to: &str,
        code: ErrorCode,
        message: &str,
        original_msg_id: Option<&str>,
    ) -> Result<String> {
        if to.is_empty() {
            return Err(ProtocolError::invalid_argument("'to' must not be empty"));
        }

        let mut reference = BTreeMap::new();
        reference.insert("error_code".to_string(), code.as_u8().to_string());
        reference.insert("error_message".to_string(), message.to_string());
        if let Some(original) = original_msg_id {
            if !original.is_empty() {
                reference.insert("original_message_id".to_string(), original.to_string());
            }
        }

        let envelope = self
            .envelope_builder(to, OperationType::Error)
            .payload_ref(reference)
            .build()?;
        self.dispatch_envelope(envelope).await
    }

    /// Registers `handler` for inbound messages with operation `op`,
    /// replacing any previous handler for that operation.
    pub fn register_handler(&self, op: OperationType, handler: MessageHandler) {
        self.inner.handlers.write().insert(op, handler);
    }

    /// Removes the handler for `op`; subsequent messages with that operation
    /// are silently accepted.
    pub fn unregister_handler(&self, op: OperationType) {
        self.inner.handlers.write().remove(&op);
    }

    /// Processes one inbound wire message.
    ///
    /// Binary frames are surfaced to handlers as a synthesized envelope
    /// (`msg_id` = `frame-<stream_id>-<sequence>`) plus the payload bytes;
    /// JSON envelopes are surfaced without a payload. Messages with no
    /// registered handler are silently accepted.
    ///
    /// # Errors
    ///
    /// Malformed input and failing payload treatment increment the error
    /// counter and return the codec error. A panicking handler increments the
    /// error counter and returns [`ProtocolError::InvalidArgument`]; the
    /// receive path stays usable.
    pub fn process_message(&self, data: &[u8]) -> Result<()> {
        let max = self.inner.config.read().max_message_size;
        let message = match crate::serialization::decode_message(data, max) {
            Ok(message) => message,
            Err(error) => {
                self.inner.stats.record_error();
                return Err(error);
            }
        };
        self.inner.stats.record_received(data.len() as u64);

        let (envelope, payload) = match message {
            WireMessage::Envelope(envelope) => (envelope, None),
            WireMessage::Frame(frame) => {
                let payload = match self.unwrap_frame_payload(&frame) {
                    Ok(payload) => payload,
                    Err(error) => {
                        self.inner.stats.record_error();
                        return Err(error);
                    }
                };
                (self.synthesize_envelope(&frame), Some(payload))
            }
        };

        let handler = self.inner.handlers.read().get(&envelope.op).cloned();
        let Some(handler) = handler else {
            return Ok(());
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            handler(&envelope, payload.as_deref());
        }));
        if let Err(panic) = outcome {
            self.inner.stats.record_error();
            return Err(ProtocolError::invalid_argument(format!(
                "handler panicked: {}",
                panic_message(&panic)
            )));
        }
        Ok(())
    }

    /// Attaches a security manager.
    pub fn set_security_manager(&self, security: Arc<dyn SecurityManager>) {
        *self.inner.security.write() = Some(security);
    }

    /// Returns `true` iff a security manager is attached and reports
    /// authentication.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .security
            .read()
            .as_ref()
            .is_some_and(|security| security.is_authenticated())
    }

    /// Returns a consistent snapshot of the orchestrator statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Zeroes the statistics counters and restamps the start time.
    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }

    fn envelope_builder(&self, to: &str, op: OperationType) -> crate::envelope::EnvelopeBuilder {
        Envelope::builder()
            .version(self.inner.config.read().version.clone())
            .from(self.inner.local_id.clone())
            .to(to)
            .operation(op)
    }

    /// Serializes and sends an envelope over the connected transport,
    /// returning its message id. Statistics count the serialized size.
    async fn dispatch_envelope(&self, envelope: Envelope) -> Result<String> {
        let config = self.inner.config.read().clone();
        let transport = self.connected_transport()?;
        self.check_security_requirements(&config)?;

        let bytes = json::serialize_envelope(&envelope)?;
        transport.send(&bytes).await?;
        self.inner.stats.record_sent(bytes.len() as u64);
        Ok(envelope.msg_id)
    }

    fn synthesize_envelope(&self, frame: &Frame) -> Envelope {
        Envelope {
            version: frame.header.version.to_string(),
            msg_id: format!(
                "frame-{}-{}",
                frame.header.stream_id, frame.header.sequence
            ),
            ts: timestamp_now(),
            from: String::new(),
            to: self.inner.local_id.clone(),
            op: frame.header.op,
            capabilities: None,
            schema_uri: None,
            accept: None,
            payload_hint: None,
            payload_refs: None,
        }
    }

    /// Reverses the payload treatment of an inbound frame: decrypt first,
    /// then decompress (the sender compresses before encrypting).
    fn unwrap_frame_payload(&self, frame: &Frame) -> Result<Vec<u8>> {
        let mut payload = frame.payload.clone();

        if frame.header.flags.contains(FrameFlags::ENCRYPTED_XCHACHA20) {
            let security = self.inner.security.read().clone();
            let Some(security) = security else {
                return Err(ProtocolError::DecryptionFailed {
                    reason: "encrypted frame received without a security manager".to_string(),
                });
            };
            payload = security.decrypt(&payload)?;
        }

        if frame.header.flags.contains(FrameFlags::COMPRESSED_BROTLI) {
            return Err(ProtocolError::NotImplemented {
                feature: "brotli decompression".to_string(),
            });
        }
        if frame.header.flags.contains(FrameFlags::COMPRESSED_GZIP) {
            payload = compression::decompress(&payload, CompressionAlgorithm::Gzip)?;
        }

        Ok(payload)
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        self.inner
            .transport
            .read()
            .clone()
            .ok_or_else(|| ProtocolError::network("no transport attached"))
    }

    fn connected_transport(&self) -> Result<Arc<dyn Transport>> {
        let transport = self.transport()?;
        if !transport.is_connected() {
            return Err(ProtocolError::network("transport not connected"));
        }
        Ok(transport)
    }

    fn check_security_requirements(&self, config: &ProtocolConfig) -> Result<()> {
        if !config.require_auth && !config.require_encryption {
            return Ok(());
        }
        let security = self.inner.security.read().clone();
        if config.require_auth
            && !security
                .as_ref()
                .is_some_and(|security| security.is_authenticated())
        {
            return Err(ProtocolError::AuthenticationFailed {
                reason: "authentication required before sending".to_string(),
            });
        }
        if config.require_encryption
            && !security
                .as_ref()
                .is_some_and(|security| security.has_session())
        {
            return Err(ProtocolError::AuthenticationFailed {
                reason: "encrypted session required before sending".to_string(),
            });
        }
        Ok(())
    }
}

/// Best-effort extraction of a panic payload's message.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::binary::encode_frame;
    use parking_lot::Mutex;

    fn protocol() -> Protocol {
        Protocol::new("local-node").unwrap()
    }

    #[test]
    fn test_new_rejects_empty_id() {
        let error = Protocol::new("").unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_configure_validates_numeric_fields() {
        let protocol = protocol();

        let config = ProtocolConfig::default().with_max_message_size(0);
        assert_eq!(
            protocol.configure(config).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );

        let config = ProtocolConfig::default().with_connection_timeout_ms(0);
        assert_eq!(
            protocol.configure(config).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );

        let config = ProtocolConfig::default().with_heartbeat_interval_ms(0);
        assert_eq!(
            protocol.configure(config).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );

        assert!(protocol.configure(ProtocolConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_send_control_validates_arguments() {
        let protocol = protocol();
        let error = protocol
            .send_control("", OperationType::Control, "ping", None)
            .await
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidArgument);

        let error = protocol
            .send_control("peer", OperationType::Control, "", None)
            .await
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn test_send_without_transport_is_network_error() {
        let protocol = protocol();
        let error = protocol
            .send_control("peer", OperationType::Control, "ping", None)
            .await
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::NetworkError);
        assert!(!protocol.is_connected());

        let error = protocol.send_ack("peer", "msg-1-001").await.unwrap_err();
        assert_eq!(error.code(), ErrorCode::NetworkError);

        let error = protocol
            .send_error("peer", ErrorCode::Timeout, "too slow", None)
            .await
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::NetworkError);
    }

    #[tokio::test]
    async fn test_send_data_validates_arguments() {
        let protocol = protocol();
        let error = protocol.send_data("", b"payload", None).await.unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidArgument);

        let error = protocol.send_data("peer", b"", None).await.unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn test_send_data_oversize_is_buffer_overflow() {
        let protocol = protocol();
        protocol
            .configure(ProtocolConfig::default().with_max_message_size(1024))
            .unwrap();

        let oversize = vec![0u8; 1025];
        let error = protocol.send_data("peer", &oversize, None).await.unwrap_err();
        assert_eq!(error.code(), ErrorCode::BufferOverflow);
        assert_eq!(protocol.stats().messages_sent, 0);
    }

    #[tokio::test]
    async fn test_send_data_respects_enable_binary() {
        let protocol = protocol();
        protocol
            .configure(ProtocolConfig::default().with_binary(false))
            .unwrap();
        let error = protocol.send_data("peer", b"data", None).await.unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_dispatch_invokes_matching_handler_only() {
        let protocol = protocol();
        let data_calls = Arc::new(Mutex::new(Vec::<String>::new()));
        let control_calls = Arc::new(Mutex::new(0usize));

        let sink = Arc::clone(&data_calls);
        protocol.register_handler(
            OperationType::Data,
            Arc::new(move |envelope, payload| {
                assert_eq!(payload, Some(&b"hi"[..]));
                sink.lock().push(envelope.msg_id.clone());
            }),
        );
        let counter = Arc::clone(&control_calls);
        protocol.register_handler(
            OperationType::Control,
            Arc::new(move |_, _| {
                *counter.lock() += 1;
            }),
        );

        let frame = Frame::data(7, 0, b"hi".to_vec());
        let bytes = encode_frame(&frame).unwrap();
        protocol.process_message(&bytes).unwrap();

        let calls = data_calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], "frame-7-0");
        assert_eq!(*control_calls.lock(), 0);
    }

    #[test]
    fn test_dispatch_envelope_without_payload() {
        let protocol = protocol();
        let seen = Arc::new(Mutex::new(Vec::<(String, bool)>::new()));
        let sink = Arc::clone(&seen);
        protocol.register_handler(
            OperationType::Control,
            Arc::new(move |envelope, payload| {
                sink.lock()
                    .push((envelope.from.clone(), payload.is_some()));
            }),
        );

        let json = br#"{"version":"1.0","msg_id":"m","ts":"t","from":"a","to":"b","op":0}"#;
        protocol.process_message(json).unwrap();

        let calls = seen.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("a".to_string(), false));
    }

    #[test]
    fn test_unhandled_operation_is_accepted() {
        let protocol = protocol();
        let json = br#"{"version":"1.0","msg_id":"m","ts":"t","from":"a","to":"b","op":2}"#;
        assert!(protocol.process_message(json).is_ok());
        assert_eq!(protocol.stats().messages_received, 1);
        assert_eq!(protocol.stats().errors_count, 0);
    }

    #[test]
    fn test_unregister_takes_effect() {
        let protocol = protocol();
        let count = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&count);
        protocol.register_handler(
            OperationType::Control,
            Arc::new(move |_, _| {
                *counter.lock() += 1;
            }),
        );

        let json = br#"{"version":"1.0","msg_id":"m","ts":"t","from":"a","to":"b","op":0}"#;
        protocol.process_message(json).unwrap();
        protocol.unregister_handler(OperationType::Control);
        protocol.process_message(json).unwrap();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_panicking_handler_is_counted_once() {
        let protocol = protocol();
        protocol.register_handler(
            OperationType::Control,
            Arc::new(|_, _| panic!("handler exploded")),
        );

        let json = br#"{"version":"1.0","msg_id":"m","ts":"t","from":"a","to":"b","op":0}"#;
        let error = protocol.process_message(json).unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidArgument);
        assert!(error.to_string().contains("handler exploded"));
        assert_eq!(protocol.stats().errors_count, 1);

        // The receive path keeps working afterwards.
        protocol.unregister_handler(OperationType::Control);
        protocol.process_message(json).unwrap();
        assert_eq!(protocol.stats().messages_received, 2);
    }

    #[test]
    fn test_malformed_input_counts_one_error() {
        let protocol = protocol();
        assert!(protocol.process_message(b"not a message").is_err());
        assert_eq!(protocol.stats().errors_count, 1);
        assert_eq!(protocol.stats().messages_received, 0);
    }

    #[test]
    fn test_compressed_frame_payload_is_expanded() {
        let protocol = protocol();
        let original = vec![9u8; 4096];
        let packed = compression::compress(
            &original,
            CompressionAlgorithm::Gzip,
            compression::DEFAULT_COMPRESSION_LEVEL,
        )
        .unwrap();
        let frame = Frame::builder()
            .operation(OperationType::Data)
            .flags(FrameFlags::COMPRESSED_GZIP)
            .stream_id(3)
            .payload(packed)
            .build()
            .unwrap();
        let bytes = encode_frame(&frame).unwrap();

        let seen = Arc::new(Mutex::new(Vec::<u8>::new()));
        let sink = Arc::clone(&seen);
        protocol.register_handler(
            OperationType::Data,
            Arc::new(move |_, payload| {
                sink.lock().extend_from_slice(payload.unwrap());
            }),
        );
        protocol.process_message(&bytes).unwrap();
        assert_eq!(*seen.lock(), original);
    }

    #[test]
    fn test_encrypted_frame_without_security_manager_fails() {
        let protocol = protocol();
        let frame = Frame::builder()
            .operation(OperationType::Data)
            .flags(FrameFlags::ENCRYPTED_XCHACHA20)
            .stream_id(1)
            .payload(vec![1, 2, 3])
            .build()
            .unwrap();
        let bytes = encode_frame(&frame).unwrap();
        let error = protocol.process_message(&bytes).unwrap_err();
        assert_eq!(error.code(), ErrorCode::DecryptionFailed);
        assert_eq!(protocol.stats().errors_count, 1);
    }

    #[test]
    fn test_is_authenticated_without_manager() {
        let protocol = protocol();
        assert!(!protocol.is_authenticated());
    }

    /// Test double reporting fixed authentication/session state; payload
    /// operations are identity.
    struct StubSecurity {
        authenticated: bool,
        session: bool,
    }

    impl crate::security::SecurityManager for StubSecurity {
        fn generate_keypair(&self) -> Result<()> {
            Ok(())
        }
        fn load_private_key(&self, _key: &[u8]) -> Result<()> {
            Ok(())
        }
        fn set_peer_public_key(&self, _key: &[u8]) -> Result<()> {
            Ok(())
        }
        fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
            Ok(data.to_vec())
        }
        fn verify(&self, _data: &[u8], _signature: &[u8]) -> Result<bool> {
            Ok(true)
        }
        fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
            Ok(plaintext.to_vec())
        }
        fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
            Ok(ciphertext.to_vec())
        }
        fn establish_session(&self, _peer_id: &str) -> Result<()> {
            Ok(())
        }
        fn close_session(&self) {}
        fn has_session(&self) -> bool {
            self.session
        }
        fn is_authenticated(&self) -> bool {
            self.authenticated
        }
        fn peer_id(&self) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn test_require_auth_gates_sends() {
        use crate::transport::MemoryTransport;

        let (local, _remote) = MemoryTransport::pair();
        let protocol = protocol();
        protocol.set_transport(Arc::new(local));
        protocol.connect().await.unwrap();
        protocol
            .configure(ProtocolConfig::default().with_required_auth(true))
            .unwrap();

        let error = protocol
            .send_control("peer", OperationType::Control, "ping", None)
            .await
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::AuthenticationFailed);

        protocol.set_security_manager(Arc::new(StubSecurity {
            authenticated: true,
            session: false,
        }));
        assert!(protocol.is_authenticated());
        protocol
            .send_control("peer", OperationType::Control, "ping", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_require_encryption_gates_sends() {
        use crate::transport::MemoryTransport;

        let (local, _remote) = MemoryTransport::pair();
        let protocol = protocol();
        protocol.set_transport(Arc::new(local));
        protocol.connect().await.unwrap();
        protocol
            .configure(ProtocolConfig::default().with_required_encryption(true))
            .unwrap();

        protocol.set_security_manager(Arc::new(StubSecurity {
            authenticated: true,
            session: false,
        }));
        let error = protocol
            .send_data("peer", b"secret", None)
            .await
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::AuthenticationFailed);

        protocol.set_security_manager(Arc::new(StubSecurity {
            authenticated: true,
            session: true,
        }));
        protocol.send_data("peer", b"secret", None).await.unwrap();
    }

    #[test]
    fn test_encrypted_frame_with_manager_is_decrypted() {
        let protocol = protocol();
        protocol.set_security_manager(Arc::new(StubSecurity {
            authenticated: true,
            session: true,
        }));

        let frame = Frame::builder()
            .operation(OperationType::Data)
            .flags(FrameFlags::ENCRYPTED_XCHACHA20)
            .stream_id(5)
            .payload(b"ciphertext".to_vec())
            .build()
            .unwrap();
        let bytes = encode_frame(&frame).unwrap();

        let seen = Arc::new(Mutex::new(Vec::<u8>::new()));
        let sink = Arc::clone(&seen);
        protocol.register_handler(
            OperationType::Data,
            Arc::new(move |_, payload| {
                sink.lock().extend_from_slice(payload.unwrap());
            }),
        );
        protocol.process_message(&bytes).unwrap();
        // The stub's decrypt is identity.
        assert_eq!(*seen.lock(), b"ciphertext");
    }

    #[test]
    fn test_reset_stats_is_idempotent() {
        let protocol = protocol();
        let json = br#"{"version":"1.0","msg_id":"m","ts":"t","from":"a","to":"b","op":0}"#;
        protocol.process_message(json).unwrap();

        protocol.reset_stats();
        let first = protocol.stats();
        protocol.reset_stats();
        let second = protocol.stats();
        assert_eq!(first.messages_received, 0);
        assert_eq!(second.messages_received, 0);
        assert_eq!(first.errors_count, second.errors_count);
    }
}
