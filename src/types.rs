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

//! Core protocol types, enumerations, and constants.
//!
//! This module is the leaf of the crate's dependency graph: every other layer
//! builds on the enumerations and configuration records defined here. All
//! enumerations carry stable numeric ordinals that match the wire protocol.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version carried in every envelope.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Wire version of the binary frame format.
pub const FRAME_VERSION: u8 = 1;

/// Size of the binary frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 16;

/// Default upper bound on a single message payload (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default internal buffer size for transports.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Operation kind of a message.
///
/// The operation discriminates control traffic, binary data, acknowledgements,
/// and error reports. It is serialized as its numeric ordinal both in the
/// envelope JSON (`"op":1`) and in the frame header type byte.
///
/// # Examples
///
/// ```rust
/// use umicp::types::OperationType;
///
/// assert_eq!(OperationType::Data.as_u8(), 1);
/// assert_eq!(OperationType::try_from(2u8).unwrap(), OperationType::Ack);
/// assert!(OperationType::try_from(9u8).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationType {
    /// Control message (commands, negotiation).
    Control = 0,
    /// Binary data message.
    Data = 1,
    /// Acknowledgement of a previously received message.
    Ack = 2,
    /// Error report, optionally correlated to a previous message.
    Error = 3,
}

impl OperationType {
    /// Returns the numeric ordinal used on the wire.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for OperationType {
    type Error = InvalidOrdinal;

    fn try_from(value: u8) -> Result<Self, InvalidOrdinal> {
        match value {
            0 => Ok(Self::Control),
            1 => Ok(Self::Data),
            2 => Ok(Self::Ack),
            3 => Ok(Self::Error),
            other => Err(InvalidOrdinal {
                kind: "operation",
                value: other,
            }),
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "CONTROL"),
            Self::Data => write!(f, "DATA"),
            Self::Ack => write!(f, "ACK"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl Serialize for OperationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OperationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::try_from(value).map_err(de::Error::custom)
    }
}

/// Error raised when a numeric ordinal does not name an enum member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidOrdinal {
    /// Which enumeration rejected the value.
    pub kind: &'static str,
    /// The out-of-range ordinal.
    pub value: u8,
}

impl fmt::Display for InvalidOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} ordinal {}", self.kind, self.value)
    }
}

impl std::error::Error for InvalidOrdinal {}

/// Serialization format preference carried in negotiation hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    /// UTF-8 JSON.
    Json = 0,
    /// CBOR binary encoding.
    Cbor = 1,
    /// MessagePack binary encoding.
    MsgPack = 2,
}

impl ContentType {
    /// Returns the numeric ordinal used in negotiation hints.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the MIME-style name used in `accept` lists.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Cbor => "application/cbor",
            Self::MsgPack => "application/msgpack",
        }
    }
}

impl TryFrom<u8> for ContentType {
    type Error = InvalidOrdinal;

    fn try_from(value: u8) -> Result<Self, InvalidOrdinal> {
        match value {
            0 => Ok(Self::Json),
            1 => Ok(Self::Cbor),
            2 => Ok(Self::MsgPack),
            other => Err(InvalidOrdinal {
                kind: "content type",
                value: other,
            }),
        }
    }
}

/// High-level shape of a binary payload, carried in [`PayloadHint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PayloadType {
    /// Dense numeric vector data.
    Vector = 0,
    /// UTF-8 text.
    Text = 1,
    /// Structured metadata.
    Metadata = 2,
    /// Opaque binary.
    Binary = 3,
}

impl PayloadType {
    /// Returns the numeric ordinal used on the wire.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PayloadType {
    type Error = InvalidOrdinal;

    fn try_from(value: u8) -> Result<Self, InvalidOrdinal> {
        match value {
            0 => Ok(Self::Vector),
            1 => Ok(Self::Text),
            2 => Ok(Self::Metadata),
            3 => Ok(Self::Binary),
            other => Err(InvalidOrdinal {
                kind: "payload type",
                value: other,
            }),
        }
    }
}

impl Serialize for PayloadType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for PayloadType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::try_from(value).map_err(de::Error::custom)
    }
}

/// Element encoding of a numeric payload, carried in [`PayloadHint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum EncodingType {
    Float32 = 0,
    Float64 = 1,
    Int32 = 2,
    Int64 = 3,
    Uint8 = 4,
    Uint16 = 5,
    Uint32 = 6,
    Uint64 = 7,
}

impl EncodingType {
    /// Returns the numeric ordinal used on the wire.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for EncodingType {
    type Error = InvalidOrdinal;

    fn try_from(value: u8) -> Result<Self, InvalidOrdinal> {
        match value {
            0 => Ok(Self::Float32),
            1 => Ok(Self::Float64),
            2 => Ok(Self::Int32),
            3 => Ok(Self::Int64),
            4 => Ok(Self::Uint8),
            5 => Ok(Self::Uint16),
            6 => Ok(Self::Uint32),
            7 => Ok(Self::Uint64),
            other => Err(InvalidOrdinal {
                kind: "encoding",
                value: other,
            }),
        }
    }
}

impl Serialize for EncodingType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for EncodingType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::try_from(value).map_err(de::Error::custom)
    }
}

/// Kind of transport a connection endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransportKind {
    /// Stream-framed WebSocket transport (`ws://` / `wss://`).
    WebSocket = 0,
    /// Multiplexed HTTP/2-style transport (`https://`).
    Http2 = 1,
    /// In-process pair transport, primarily for tests.
    Direct = 3,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSocket => write!(f, "websocket"),
            Self::Http2 => write!(f, "http2"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// Describes the binary companion of an envelope.
///
/// A payload hint lets the receiver allocate and interpret an incoming frame
/// without inspecting its bytes. Only the payload kind is mandatory; size,
/// element encoding, and element count are advisory.
///
/// # Examples
///
/// ```rust
/// use umicp::types::{EncodingType, PayloadHint, PayloadType};
///
/// let hint = PayloadHint::new(PayloadType::Vector)
///     .with_size(1024)
///     .with_encoding(EncodingType::Float32)
///     .with_count(256);
/// assert_eq!(hint.size, Some(1024));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHint {
    /// Shape of the payload.
    #[serde(rename = "type")]
    pub kind: PayloadType,
    /// Payload size in bytes, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Element encoding for numeric payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<EncodingType>,
    /// Element count for numeric payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl PayloadHint {
    /// Creates a hint for the given payload kind with no advisory fields.
    #[must_use]
    pub fn new(kind: PayloadType) -> Self {
        Self {
            kind,
            size: None,
            encoding: None,
            count: None,
        }
    }

    /// Sets the payload size in bytes.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the element encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: EncodingType) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Sets the element count.
    #[must_use]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

/// Protocol-level configuration for a [`Protocol`](crate::Protocol) instance.
///
/// All durations are in milliseconds to match the wire-level negotiation
/// vocabulary. Numeric fields must be non-zero; [`crate::Protocol::configure`]
/// rejects violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Protocol version stamped into outbound envelopes.
    pub version: String,
    /// Upper bound on a single payload in bytes.
    pub max_message_size: usize,
    /// Upper bound on connection establishment, in milliseconds.
    pub connection_timeout_ms: u32,
    /// Keepalive interval, in milliseconds (advisory to the transport).
    pub heartbeat_interval_ms: u32,
    /// Whether binary frames may be sent; when false all traffic is envelopes.
    pub enable_binary: bool,
    /// Preferred payload serialization format, carried in negotiation hints.
    pub preferred_format: ContentType,
    /// Whether outbound data payloads are considered for compression.
    pub enable_compression: bool,
    /// Minimum payload size in bytes before compression applies.
    pub compression_threshold: usize,
    /// Refuse sends unless the security manager reports authentication.
    pub require_auth: bool,
    /// Refuse sends unless the security manager reports an established session.
    pub require_encryption: bool,
    /// Whether TLS-backed transports should validate peer certificates.
    pub validate_certificates: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            max_message_size: MAX_MESSAGE_SIZE,
            connection_timeout_ms: 30_000,
            heartbeat_interval_ms: 30_000,
            enable_binary: true,
            preferred_format: ContentType::Cbor,
            enable_compression: true,
            compression_threshold: 1024,
            require_auth: false,
            require_encryption: false,
            validate_certificates: true,
        }
    }
}

impl ProtocolConfig {
    /// Sets the maximum message size in bytes.
    #[must_use]
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Sets the connection timeout in milliseconds.
    #[must_use]
    pub fn with_connection_timeout_ms(mut self, millis: u32) -> Self {
        self.connection_timeout_ms = millis;
        self
    }

    /// Sets the heartbeat interval in milliseconds.
    #[must_use]
    pub fn with_heartbeat_interval_ms(mut self, millis: u32) -> Self {
        self.heartbeat_interval_ms = millis;
        self
    }

    /// Enables or disables binary frame traffic.
    #[must_use]
    pub fn with_binary(mut self, enabled: bool) -> Self {
        self.enable_binary = enabled;
        self
    }

    /// Enables or disables payload compression and sets its threshold.
    #[must_use]
    pub fn with_compression(mut self, enabled: bool, threshold: usize) -> Self {
        self.enable_compression = enabled;
        self.compression_threshold = threshold;
        self
    }

    /// Requires authentication before any send.
    #[must_use]
    pub fn with_required_auth(mut self, required: bool) -> Self {
        self.require_auth = required;
        self
    }

    /// Requires an established session before any send.
    #[must_use]
    pub fn with_required_encryption(mut self, required: bool) -> Self {
        self.require_encryption = required;
        self
    }
}
