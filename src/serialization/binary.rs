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

//! Frame <-> bytes codec.
//!
//! Wire layout, all multi-byte integers little-endian:
//!
//! ```text
//! +---------+------+---------+-----------+----------+-------------+
//! | version | type | flags   | stream_id | sequence | payload     |
//! | 1 byte  | 1 B  | 2 bytes | 8 bytes   | 4 bytes  | length bytes|
//! +---------+------+---------+-----------+----------+-------------+
//! ```
//!
//! The header is exactly 16 bytes; the payload length is the remainder of
//! the buffer and is mirrored into `FrameHeader.length` (a frame with a
//! 4-byte payload serializes to 20 bytes).

use crate::error::{ProtocolError, Result};
use crate::frame::{Frame, FrameFlags, FrameHeader};
use crate::types::{OperationType, FRAME_HEADER_SIZE, MAX_MESSAGE_SIZE};

/// Serializes a frame using the default payload limit ([`MAX_MESSAGE_SIZE`]).
///
/// # Errors
///
/// See [`encode_frame_with_limit`].
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>> {
    encode_frame_with_limit(frame, MAX_MESSAGE_SIZE)
}

/// Serializes a frame, rejecting payloads above `max_payload`.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidFrame`] if the header length disagrees
/// with the payload, the flags are inconsistent, or the payload exceeds the
/// limit.
pub fn encode_frame_with_limit(frame: &Frame, max_payload: usize) -> Result<Vec<u8>> {
    frame.header.flags.validate()?;
    if frame.header.length as usize != frame.payload.len() {
        return Err(ProtocolError::invalid_frame(format!(
            "header length {} does not match payload length {}",
            frame.header.length,
            frame.payload.len()
        )));
    }
    if frame.payload.len() > max_payload {
        return Err(ProtocolError::invalid_frame(format!(
            "payload of {} bytes exceeds maximum of {} bytes",
            frame.payload.len(),
            max_payload
        )));
    }

    let mut data = Vec::with_capacity(FRAME_HEADER_SIZE + frame.payload.len());
    data.push(frame.header.version);
    data.push(frame.header.op.as_u8());
    data.extend_from_slice(&frame.header.flags.bits().to_le_bytes());
    data.extend_from_slice(&frame.header.stream_id.to_le_bytes());
    data.extend_from_slice(&frame.header.sequence.to_le_bytes());
    data.extend_from_slice(&frame.payload);
    Ok(data)
}

/// Deserializes a frame using the default payload limit ([`MAX_MESSAGE_SIZE`]).
///
/// # Errors
///
/// See [`decode_frame_with_limit`].
pub fn decode_frame(data: &[u8]) -> Result<Frame> {
    decode_frame_with_limit(data, MAX_MESSAGE_SIZE)
}

/// Deserializes a frame, rejecting payloads above `max_payload`.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidFrame`] for inputs shorter than the
/// 16-byte header, out-of-range type ordinals, inconsistent flags, or
/// oversized payloads.
pub fn decode_frame_with_limit(data: &[u8], max_payload: usize) -> Result<Frame> {
    if data.len() < FRAME_HEADER_SIZE {
        return Err(ProtocolError::invalid_frame(format!(
            "truncated header: expected at least {} bytes, got {}",
            FRAME_HEADER_SIZE,
            data.len()
        )));
    }

    let version = data[0];
    let op = OperationType::try_from(data[1])
        .map_err(|error| ProtocolError::invalid_frame(error.to_string()))?;
    let flags = FrameFlags::from_bits(u16::from_le_bytes([data[2], data[3]]));
    flags.validate()?;
    let stream_id = data[4..12]
        .try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| ProtocolError::invalid_frame("unreadable stream id"))?;
    let sequence = data[12..16]
        .try_into()
        .map(u32::from_le_bytes)
        .map_err(|_| ProtocolError::invalid_frame("unreadable sequence"))?;

    let payload = &data[FRAME_HEADER_SIZE..];
    if payload.len() > max_payload {
        return Err(ProtocolError::invalid_frame(format!(
            "payload of {} bytes exceeds maximum of {} bytes",
            payload.len(),
            max_payload
        )));
    }

    Ok(Frame {
        header: FrameHeader {
            version,
            op,
            flags,
            stream_id,
            sequence,
            length: payload.len() as u32,
        },
        payload: payload.to_vec(),
    })
}
