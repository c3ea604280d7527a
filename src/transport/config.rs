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

//! Transport configuration.

use crate::error::{ProtocolError, Result};
use crate::types::{TransportKind, MAX_MESSAGE_SIZE};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for one transport instance.
///
/// The endpoint fields (`kind`, `host`, `port`, `path`, `use_tls`) identify
/// the remote peer and may only change while disconnected; the remaining
/// fields are mutable at any time through
/// [`Transport::configure`](crate::transport::Transport::configure).
///
/// # Examples
///
/// ```rust
/// use umicp::transport::TransportConfig;
///
/// let config = TransportConfig::websocket("example.com", 443)
///     .with_path("/agents")
///     .with_tls(true);
/// assert_eq!(config.endpoint_url(), "wss://example.com:443/agents");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Which transport implementation this configuration targets.
    pub kind: TransportKind,
    /// Remote host name or address.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Request path for URL-addressed transports.
    pub path: String,
    /// Additional headers sent during the handshake.
    pub headers: BTreeMap<String, String>,
    /// Whether to use TLS (`wss://` / `https://`).
    pub use_tls: bool,
    /// Whether to validate the peer's TLS certificate.
    pub validate_certificates: bool,
    /// Upper bound on a single message payload, in bytes.
    pub max_payload_size: usize,
    /// Upper bound on connection establishment.
    pub connection_timeout: Duration,
    /// Keepalive interval for transports that emit periodic pings.
    pub heartbeat_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::WebSocket,
            host: "localhost".to_string(),
            port: 8080,
            path: "/".to_string(),
            headers: BTreeMap::new(),
            use_tls: false,
            validate_certificates: true,
            max_payload_size: MAX_MESSAGE_SIZE,
            connection_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Creates a WebSocket configuration for the given host and port.
    #[must_use]
    pub fn websocket(host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: TransportKind::WebSocket,
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Creates a configuration for the in-process pair transport.
    #[must_use]
    pub fn direct() -> Self {
        Self {
            kind: TransportKind::Direct,
            host: "local".to_string(),
            port: 0,
            ..Self::default()
        }
    }

    /// Sets the request path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Enables or disables TLS.
    #[must_use]
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Adds one handshake header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the maximum payload size in bytes.
    #[must_use]
    pub fn with_max_payload_size(mut self, bytes: usize) -> Self {
        self.max_payload_size = bytes;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the keepalive interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Checks the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] for an empty host, a zero
    /// port on a network transport, or a zero payload limit.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ProtocolError::invalid_argument("host must not be empty"));
        }
        if self.port == 0 && self.kind != TransportKind::Direct {
            return Err(ProtocolError::invalid_argument("port must be non-zero"));
        }
        if self.max_payload_size == 0 {
            return Err(ProtocolError::invalid_argument(
                "max_payload_size must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Renders the endpoint in human-readable URL form,
    /// `<scheme>://<host>:<port><path>`.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        match self.kind {
            TransportKind::WebSocket => {
                let scheme = if self.use_tls { "wss" } else { "ws" };
                format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
            }
            TransportKind::Http2 => {
                format!("https://{}:{}{}", self.host, self.port, self.path)
            }
            TransportKind::Direct => "direct://local".to_string(),
        }
    }

    /// Returns `true` if `other` addresses the same remote endpoint.
    ///
    /// Used by [`Transport::configure`](crate::transport::Transport::configure)
    /// to decide whether a reconfiguration is allowed while connected.
    #[must_use]
    pub fn same_endpoint(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.host == other.host
            && self.port == other.port
            && self.path == other.path
            && self.use_tls == other.use_tls
    }
}
