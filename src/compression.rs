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

//! Buffer-level payload compression.
//!
//! Frame payloads may be compressed before (and decompressed after) the wire.
//! The supported algorithms are zlib and gzip plus the identity algorithm
//! [`CompressionAlgorithm::None`]; the orchestrator decides per payload with
//! [`should_compress`].

use crate::error::{ProtocolError, Result};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::fmt;
use std::io::{Read, Write};

/// Default compression level (balanced speed/ratio).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Payload compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionAlgorithm {
    /// Identity: payload passes through unchanged.
    None,
    /// Raw zlib (RFC 1950).
    Zlib,
    /// Gzip (RFC 1952).
    Gzip,
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Zlib => write!(f, "zlib"),
            Self::Gzip => write!(f, "gzip"),
        }
    }
}

/// Compresses a payload with the given algorithm and level (0-9, clamped).
///
/// Empty input yields empty output regardless of algorithm.
///
/// # Errors
///
/// Returns [`ProtocolError::CompressionFailed`] if the underlying codec
/// reports an error.
///
/// # Examples
///
/// ```rust
/// use umicp::compression::{compress, decompress, CompressionAlgorithm};
///
/// let data = vec![7u8; 4096];
/// let packed = compress(&data, CompressionAlgorithm::Gzip, 6).unwrap();
/// assert!(packed.len() < data.len());
/// assert_eq!(decompress(&packed, CompressionAlgorithm::Gzip).unwrap(), data);
/// ```
pub fn compress(data: &[u8], algorithm: CompressionAlgorithm, level: u32) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let level = Compression::new(level.min(9));
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), level);
            encoder.write_all(data).map_err(compression_error)?;
            encoder.finish().map_err(compression_error)
        }
        CompressionAlgorithm::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), level);
            encoder.write_all(data).map_err(compression_error)?;
            encoder.finish().map_err(compression_error)
        }
    }
}

/// Decompresses a payload, growing the output buffer as needed.
///
/// Empty input yields empty output.
///
/// # Errors
///
/// Returns [`ProtocolError::DecompressionFailed`] on truncated or corrupt
/// input.
pub fn decompress(data: &[u8], algorithm: CompressionAlgorithm) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Zlib => {
            let mut output = Vec::new();
            ZlibDecoder::new(data)
                .read_to_end(&mut output)
                .map_err(decompression_error)?;
            Ok(output)
        }
        CompressionAlgorithm::Gzip => {
            let mut output = Vec::new();
            GzDecoder::new(data)
                .read_to_end(&mut output)
                .map_err(decompression_error)?;
            Ok(output)
        }
    }
}

/// Returns `true` iff the payload is at least `threshold` bytes and the
/// algorithm actually compresses.
#[must_use]
pub fn should_compress(data: &[u8], threshold: usize, algorithm: CompressionAlgorithm) -> bool {
    data.len() >= threshold && algorithm != CompressionAlgorithm::None
}

fn compression_error(error: std::io::Error) -> ProtocolError {
    ProtocolError::CompressionFailed {
        reason: error.to_string(),
    }
}

fn decompression_error(error: std::io::Error) -> ProtocolError {
    ProtocolError::DecompressionFailed {
        reason: error.to_string(),
    }
}
