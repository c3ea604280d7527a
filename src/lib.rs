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

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # Architecture
//!
//! The crate is organized in dependency order, leaves first:
//!
//! - [`types`] / [`error`]: enumerations, constants, configuration, and the
//!   crate-wide result type
//! - [`envelope`] / [`frame`]: the two wire records
//! - [`serialization`]: envelope JSON codec, frame binary codec, canonical
//!   hashing, and frame-vs-envelope discrimination
//! - [`compression`]: buffer-level zlib/gzip payload compression
//! - [`transport`]: the connection abstraction, its WebSocket implementation,
//!   and an in-process pair transport for tests
//! - [`protocol`]: the orchestrator tying identity, transport, handlers,
//!   statistics, and the optional [`security`] manager together
//!
//! Outbound control traffic flows orchestrator → envelope → JSON bytes →
//! transport; outbound data flows orchestrator → frame → binary bytes →
//! transport. Inbound bytes arrive via the transport's message callback and
//! are discriminated by the codec before handler dispatch.

pub mod compression;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod security;
pub mod serialization;
pub mod stats;
pub mod transport;
pub mod types;

pub use envelope::{Envelope, EnvelopeBuilder};
pub use error::{ErrorCode, ProtocolError, Result};
pub use frame::{Frame, FrameBuilder, FrameFlags, FrameHeader};
pub use protocol::{MessageHandler, Protocol};
pub use security::SecurityManager;
pub use stats::{StatsRecorder, StatsSnapshot};
pub use transport::{
    create_transport, MemoryTransport, Transport, TransportConfig, WebSocketTransport,
};
pub use types::{
    ContentType, EncodingType, OperationType, PayloadHint, PayloadType, ProtocolConfig,
    TransportKind,
};

/// Convenience re-exports for the common surface.
pub mod prelude {
    pub use crate::envelope::Envelope;
    pub use crate::error::{ErrorCode, ProtocolError, Result};
    pub use crate::frame::{Frame, FrameFlags};
    pub use crate::protocol::Protocol;
    pub use crate::transport::{
        create_transport, MemoryTransport, Transport, TransportConfig, WebSocketTransport,
    };
    pub use crate::types::{OperationType, PayloadHint, ProtocolConfig, TransportKind};
}
