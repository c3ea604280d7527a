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

//! The data-plane frame record.
//!
//! A [`Frame`] is a 16-byte header followed by opaque payload bytes. The wire
//! codec lives in [`crate::serialization::binary`]; this module defines the
//! records, the [`FrameFlags`] bitmask, and a builder.

use crate::error::{ProtocolError, Result};
use crate::types::{OperationType, FRAME_VERSION};
use std::fmt;
use std::ops::BitOr;

/// Bitmask describing payload treatment and stream/fragment position.
///
/// Bits may be combined except where noted: the two compression bits are
/// mutually exclusive, and at most one fragment-position bit may be set.
///
/// # Examples
///
/// ```rust
/// use umicp::frame::FrameFlags;
///
/// let flags = FrameFlags::COMPRESSED_GZIP | FrameFlags::STREAM_END;
/// assert!(flags.contains(FrameFlags::COMPRESSED_GZIP));
/// assert!(flags.validate().is_ok());
///
/// let bad = FrameFlags::COMPRESSED_GZIP | FrameFlags::COMPRESSED_BROTLI;
/// assert!(bad.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameFlags(u16);

impl FrameFlags {
    /// Payload is gzip-compressed.
    pub const COMPRESSED_GZIP: Self = Self(1 << 0);
    /// Payload is brotli-compressed (exclusive with gzip).
    pub const COMPRESSED_BROTLI: Self = Self(1 << 1);
    /// Payload is XChaCha20 ciphertext (after compression, if both apply).
    pub const ENCRYPTED_XCHACHA20: Self = Self(1 << 2);
    /// First fragment of a fragmented logical message.
    pub const FRAGMENT_START: Self = Self(1 << 3);
    /// Middle fragment of a fragmented logical message.
    pub const FRAGMENT_CONTINUE: Self = Self(1 << 4);
    /// Final fragment of a fragmented logical message.
    pub const FRAGMENT_END: Self = Self(1 << 5);
    /// First frame of a stream.
    pub const STREAM_START: Self = Self(1 << 6);
    /// Final frame of a stream.
    pub const STREAM_END: Self = Self(1 << 7);

    /// Returns the empty flag set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Reconstructs flags from their wire representation.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Returns the wire representation.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no bits are set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `self` with the bits of `other` added.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Checks the combination rules: gzip and brotli are mutually exclusive,
    /// and at most one fragment-position bit may be set.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidFrame`] naming the violated rule.
    pub fn validate(self) -> Result<()> {
        if self.contains(Self::COMPRESSED_GZIP) && self.contains(Self::COMPRESSED_BROTLI) {
            return Err(ProtocolError::invalid_frame(
                "gzip and brotli compression flags are mutually exclusive",
            ));
        }
        let fragment_bits = [
            Self::FRAGMENT_START,
            Self::FRAGMENT_CONTINUE,
            Self::FRAGMENT_END,
        ]
        .iter()
        .filter(|bit| self.contains(**bit))
        .count();
        if fragment_bits > 1 {
            return Err(ProtocolError::invalid_frame(
                "at most one fragment-position flag may be set",
            ));
        }
        Ok(())
    }
}

impl BitOr for FrameFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for FrameFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Fixed-size frame header (16 bytes on the wire).
///
/// The `length` field mirrors the payload byte count; the codec derives it
/// from the buffer on decode and validates it against the payload on encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame wire version (currently [`FRAME_VERSION`]).
    pub version: u8,
    /// Operation kind, mirroring the envelope operation enum.
    pub op: OperationType,
    /// Payload treatment and stream/fragment position bits.
    pub flags: FrameFlags,
    /// Sender-assigned identifier grouping frames of one logical data flow.
    pub stream_id: u64,
    /// Zero-based sequence number within the stream.
    pub sequence: u32,
    /// Payload byte count.
    pub length: u32,
}

/// Binary data-plane record: a [`FrameHeader`] plus opaque payload bytes.
///
/// # Examples
///
/// ```rust
/// use umicp::frame::Frame;
/// use umicp::types::OperationType;
///
/// let frame = Frame::builder()
///     .operation(OperationType::Data)
///     .stream_id(42)
///     .sequence(1)
///     .payload(vec![0xDE, 0xAD, 0xBE, 0xEF])
///     .build()
///     .unwrap();
///
/// assert_eq!(frame.header.length, 4);
/// assert_eq!(frame.header.stream_id, 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The 16-byte header.
    pub header: FrameHeader,
    /// Opaque payload bytes; `header.length` equals `payload.len()`.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Starts building a frame.
    #[must_use]
    pub fn builder() -> FrameBuilder {
        FrameBuilder::default()
    }

    /// Creates a DATA frame with no flags, the canonical shape produced by
    /// the orchestrator's data path.
    #[must_use]
    pub fn data(stream_id: u64, sequence: u32, payload: Vec<u8>) -> Self {
        Self {
            header: FrameHeader {
                version: FRAME_VERSION,
                op: OperationType::Data,
                flags: FrameFlags::empty(),
                stream_id,
                sequence,
                length: payload.len() as u32,
            },
            payload,
        }
    }
}

/// Builder for [`Frame`].
#[derive(Debug, Default, Clone)]
pub struct FrameBuilder {
    version: Option<u8>,
    op: Option<OperationType>,
    flags: FrameFlags,
    stream_id: u64,
    sequence: u32,
    payload: Vec<u8>,
}

impl FrameBuilder {
    /// Sets the frame wire version (defaults to [`FRAME_VERSION`]).
    #[must_use]
    pub fn version(mut self, version: u8) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the operation kind (defaults to [`OperationType::Data`]).
    #[must_use]
    pub fn operation(mut self, op: OperationType) -> Self {
        self.op = Some(op);
        self
    }

    /// Adds flag bits.
    #[must_use]
    pub fn flags(mut self, flags: FrameFlags) -> Self {
        self.flags = self.flags.with(flags);
        self
    }

    /// Sets the stream identifier.
    #[must_use]
    pub fn stream_id(mut self, stream_id: u64) -> Self {
        self.stream_id = stream_id;
        self
    }

    /// Sets the sequence number.
    #[must_use]
    pub fn sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Sets the payload bytes.
    #[must_use]
    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Builds the frame, validating the flag combination and stamping
    /// `header.length` from the payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidFrame`] if the flags are inconsistent
    /// or the payload exceeds `u32::MAX` bytes.
    pub fn build(self) -> Result<Frame> {
        self.flags.validate()?;
        let length = u32::try_from(self.payload.len())
            .map_err(|_| ProtocolError::invalid_frame("payload exceeds u32::MAX bytes"))?;
        Ok(Frame {
            header: FrameHeader {
                version: self.version.unwrap_or(FRAME_VERSION),
                op: self.op.unwrap_or(OperationType::Data),
                flags: self.flags,
                stream_id: self.stream_id,
                sequence: self.sequence,
                length,
            },
            payload: self.payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits_match_wire_assignments() {
        assert_eq!(FrameFlags::COMPRESSED_GZIP.bits(), 1 << 0);
        assert_eq!(FrameFlags::COMPRESSED_BROTLI.bits(), 1 << 1);
        assert_eq!(FrameFlags::ENCRYPTED_XCHACHA20.bits(), 1 << 2);
        assert_eq!(FrameFlags::FRAGMENT_START.bits(), 1 << 3);
        assert_eq!(FrameFlags::FRAGMENT_CONTINUE.bits(), 1 << 4);
        assert_eq!(FrameFlags::FRAGMENT_END.bits(), 1 << 5);
        assert_eq!(FrameFlags::STREAM_START.bits(), 1 << 6);
        assert_eq!(FrameFlags::STREAM_END.bits(), 1 << 7);
    }

    #[test]
    fn test_flag_combination() {
        let flags = FrameFlags::COMPRESSED_GZIP | FrameFlags::STREAM_START;
        assert!(flags.contains(FrameFlags::COMPRESSED_GZIP));
        assert!(flags.contains(FrameFlags::STREAM_START));
        assert!(!flags.contains(FrameFlags::STREAM_END));
        assert!(flags.validate().is_ok());
    }

    #[test]
    fn test_compression_flags_are_exclusive() {
        let flags = FrameFlags::COMPRESSED_GZIP | FrameFlags::COMPRESSED_BROTLI;
        assert!(flags.validate().is_err());
    }

    #[test]
    fn test_single_fragment_position() {
        assert!(FrameFlags::FRAGMENT_START.validate().is_ok());
        assert!((FrameFlags::FRAGMENT_START | FrameFlags::FRAGMENT_END)
            .validate()
            .is_err());
        assert!((FrameFlags::FRAGMENT_CONTINUE | FrameFlags::FRAGMENT_END)
            .validate()
            .is_err());
    }

    #[test]
    fn test_builder_stamps_length() {
        let frame = Frame::builder()
            .operation(OperationType::Data)
            .stream_id(7)
            .payload(vec![1, 2, 3])
            .build()
            .unwrap();
        assert_eq!(frame.header.length, 3);
        assert_eq!(frame.header.version, FRAME_VERSION);
        assert_eq!(frame.header.sequence, 0);
    }

    #[test]
    fn test_builder_rejects_invalid_flags() {
        let result = Frame::builder()
            .flags(FrameFlags::COMPRESSED_GZIP | FrameFlags::COMPRESSED_BROTLI)
            .payload(vec![0])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_data_constructor() {
        let frame = Frame::data(9, 2, b"hi".to_vec());
        assert_eq!(frame.header.op, OperationType::Data);
        assert_eq!(frame.header.stream_id, 9);
        assert_eq!(frame.header.sequence, 2);
        assert_eq!(frame.header.length, 2);
        assert!(frame.header.flags.is_empty());
    }
}
