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

//! Error types for the protocol runtime.
//!
//! Every fallible operation in this crate returns [`Result<T>`], a sum-typed
//! result carrying a [`ProtocolError`]. The error's numeric kind is stable
//! across versions and exposed through [`ProtocolError::code`] for callers
//! that speak the wire-level error vocabulary (for example when building an
//! ERROR envelope).
//!
//! Handler callbacks that panic are caught at the dispatch boundary and
//! converted into a counted [`ProtocolError::InvalidArgument`]; no panic
//! crosses the public surface.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Stable numeric error kinds surfaced to callers.
///
/// The ordinals are part of the wire protocol (ERROR envelopes carry them as
/// `error_code`) and do not change across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ErrorCode {
    Success = 0,
    InvalidEnvelope = 1,
    InvalidFrame = 2,
    AuthenticationFailed = 3,
    DecryptionFailed = 4,
    CompressionFailed = 5,
    SerializationFailed = 6,
    NetworkError = 7,
    Timeout = 8,
    BufferOverflow = 9,
    InvalidArgument = 10,
    NotImplemented = 11,
    DecompressionFailed = 12,
}

impl ErrorCode {
    /// Returns the stable numeric ordinal.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Errors surfaced by the protocol runtime.
///
/// Each variant corresponds to one wire-level [`ErrorCode`] and carries a
/// human-readable message or structured context.
///
/// # Examples
///
/// ```rust
/// use umicp::error::{ErrorCode, ProtocolError};
///
/// let error = ProtocolError::BufferOverflow { size: 2048, max: 1024 };
/// assert_eq!(error.code(), ErrorCode::BufferOverflow);
/// assert!(!error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The envelope is missing required fields or carries out-of-range values.
    #[error("invalid envelope: {reason}")]
    InvalidEnvelope {
        /// Description of the violation.
        reason: String,
    },

    /// The binary frame is truncated, inconsistent, or oversized.
    #[error("invalid frame: {reason}")]
    InvalidFrame {
        /// Description of the violation.
        reason: String,
    },

    /// A security requirement was not met.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        /// Description of the failed requirement.
        reason: String,
    },

    /// Ciphertext could not be decrypted.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Description of the failure.
        reason: String,
    },

    /// Payload compression failed.
    #[error("compression failed: {reason}")]
    CompressionFailed {
        /// Description of the failure.
        reason: String,
    },

    /// Encoding a record to its wire form failed.
    #[error("serialization failed: {reason}")]
    SerializationFailed {
        /// Description of the failure.
        reason: String,
    },

    /// The transport is unavailable, unreachable, or in the wrong state.
    #[error("network error: {reason}")]
    NetworkError {
        /// Description of the failure.
        reason: String,
    },

    /// An operation exceeded its configured time budget.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// The duration that was exceeded.
        duration: Duration,
    },

    /// A payload exceeds the configured maximum message size.
    #[error("payload of {size} bytes exceeds maximum of {max} bytes")]
    BufferOverflow {
        /// Actual payload size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A caller-supplied argument is invalid.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the violation.
        reason: String,
    },

    /// The requested capability is not implemented.
    #[error("not implemented: {feature}")]
    NotImplemented {
        /// Name of the missing capability.
        feature: String,
    },

    /// Compressed payload could not be expanded.
    #[error("decompression failed: {reason}")]
    DecompressionFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl ProtocolError {
    /// Returns the stable wire-level kind of this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidEnvelope { .. } => ErrorCode::InvalidEnvelope,
            Self::InvalidFrame { .. } => ErrorCode::InvalidFrame,
            Self::AuthenticationFailed { .. } => ErrorCode::AuthenticationFailed,
            Self::DecryptionFailed { .. } => ErrorCode::DecryptionFailed,
            Self::CompressionFailed { .. } => ErrorCode::CompressionFailed,
            Self::SerializationFailed { .. } => ErrorCode::SerializationFailed,
            Self::NetworkError { .. } => ErrorCode::NetworkError,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::BufferOverflow { .. } => ErrorCode::BufferOverflow,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::NotImplemented { .. } => ErrorCode::NotImplemented,
            Self::DecompressionFailed { .. } => ErrorCode::DecompressionFailed,
        }
    }

    /// Returns `true` if the operation may succeed when retried.
    ///
    /// Network errors and timeouts are transient; everything else reflects a
    /// contract violation or unsupported input that a retry cannot fix.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NetworkError { .. } | Self::Timeout { .. })
    }

    /// Shorthand for a [`ProtocolError::NetworkError`].
    pub fn network(reason: impl Into<String>) -> Self {
        Self::NetworkError {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ProtocolError::InvalidArgument`].
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ProtocolError::InvalidEnvelope`].
    pub fn invalid_envelope(reason: impl Into<String>) -> Self {
        Self::InvalidEnvelope {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ProtocolError::InvalidFrame`].
    pub fn invalid_frame(reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut => Self::Timeout {
                duration: Duration::ZERO,
            },
            _ => Self::NetworkError {
                reason: error.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(error: serde_json::Error) -> Self {
        if error.is_data() {
            Self::InvalidEnvelope {
                reason: error.to_string(),
            }
        } else {
            Self::SerializationFailed {
                reason: error.to_string(),
            }
        }
    }
}
