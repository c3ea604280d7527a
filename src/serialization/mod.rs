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

//! Wire codecs: envelope JSON, frame binary, and message discrimination.
//!
//! One wire message is one logical unit delivered by the transport (for
//! example one WebSocket message). The transport never re-delimits;
//! [`decode_message`] decides whether a buffer is a binary frame or a JSON
//! envelope:
//!
//! - a buffer of at least [`FRAME_HEADER_SIZE`] bytes whose first byte equals
//!   [`FRAME_VERSION`] is decoded as a frame (`header.length + 16` equals the
//!   total length by construction);
//! - anything else is parsed as a UTF-8 JSON envelope. The two cases are
//!   disjoint because JSON objects start with `{` (0x7B).

pub mod binary;
pub mod hash;
pub mod json;

use crate::envelope::Envelope;
use crate::error::Result;
use crate::frame::Frame;
use crate::types::{FRAME_HEADER_SIZE, FRAME_VERSION};

/// A decoded wire message: either a control-plane envelope or a data-plane
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// A JSON envelope (no binary payload).
    Envelope(Envelope),
    /// A binary frame carrying opaque payload bytes.
    Frame(Frame),
}

/// Returns `true` if the buffer should be decoded as a binary frame.
#[must_use]
pub fn looks_like_frame(data: &[u8]) -> bool {
    data.len() >= FRAME_HEADER_SIZE && data[0] == FRAME_VERSION
}

/// Decodes one wire message, discriminating frame from envelope.
///
/// `max_payload` bounds the frame payload size; envelope size is bounded by
/// the transport's own message limit.
///
/// # Errors
///
/// Returns [`crate::error::ProtocolError::InvalidFrame`] for a buffer that
/// looks like a frame but fails frame validation, and the envelope codec's
/// errors otherwise.
pub fn decode_message(data: &[u8], max_payload: usize) -> Result<WireMessage> {
    if looks_like_frame(data) {
        binary::decode_frame_with_limit(data, max_payload).map(WireMessage::Frame)
    } else {
        json::deserialize_envelope(data).map(WireMessage::Envelope)
    }
}
