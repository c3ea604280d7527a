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

//! The control-plane envelope record.
//!
//! An [`Envelope`] names a sender, a recipient, and an operation, plus
//! optional negotiation metadata. Envelopes travel as UTF-8 JSON (see
//! [`crate::serialization::json`]); optional fields are absent on the wire,
//! never `null`.

use crate::error::{ProtocolError, Result};
use crate::types::{OperationType, PayloadHint, PROTOCOL_VERSION};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// JSON control record naming sender, recipient, operation, and optional
/// payload metadata.
///
/// Envelopes are constructed once per outbound message (usually through
/// [`Envelope::builder`] or the orchestrator) and are immutable after being
/// handed to a transport.
///
/// # Examples
///
/// ```rust
/// use umicp::envelope::Envelope;
/// use umicp::types::OperationType;
///
/// let envelope = Envelope::builder()
///     .from("node-a")
///     .to("node-b")
///     .operation(OperationType::Control)
///     .capability("command", "ping")
///     .build()
///     .unwrap();
///
/// assert_eq!(envelope.op, OperationType::Control);
/// assert!(envelope.msg_id.starts_with("msg-"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version, e.g. `"1.0"`.
    pub version: String,
    /// Message id, unique per sender (`msg-<epoch_ms>-<ddd>`).
    pub msg_id: String,
    /// Creation timestamp, RFC 3339 UTC with millisecond precision.
    pub ts: String,
    /// Sender logical id.
    pub from: String,
    /// Recipient logical id.
    pub to: String,
    /// Operation kind.
    pub op: OperationType,
    /// Negotiation hints and control commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<BTreeMap<String, String>>,
    /// Schema URI for the attached payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,
    /// Acceptable response encodings, in preference order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<Vec<String>>,
    /// Description of the binary companion frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_hint: Option<PayloadHint>,
    /// Correlation and reference entries (ACK/ERROR bookkeeping).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_refs: Option<Vec<BTreeMap<String, String>>>,
}

impl Envelope {
    /// Starts building an envelope.
    #[must_use]
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::default()
    }

    /// Checks the envelope invariants: version, msg_id, ts, from, and to are
    /// non-empty. The operation is valid by construction.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidEnvelope`] naming the first violated
    /// field.
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(ProtocolError::invalid_envelope("version must not be empty"));
        }
        if self.msg_id.is_empty() {
            return Err(ProtocolError::invalid_envelope("msg_id must not be empty"));
        }
        if self.ts.is_empty() {
            return Err(ProtocolError::invalid_envelope("ts must not be empty"));
        }
        if self.from.is_empty() {
            return Err(ProtocolError::invalid_envelope("from must not be empty"));
        }
        if self.to.is_empty() {
            return Err(ProtocolError::invalid_envelope("to must not be empty"));
        }
        Ok(())
    }

    /// Returns the stable 64-bit identity digest of this envelope as lowercase
    /// hex. See [`crate::serialization::hash`] for the canonical form.
    #[must_use]
    pub fn hash(&self) -> String {
        crate::serialization::hash::envelope_hash(self)
    }
}

/// Builder for [`Envelope`].
///
/// Fills `version`, `msg_id`, and `ts` with sensible defaults (current
/// protocol version, a freshly generated message id, the current time) when
/// not set explicitly; `from`, `to`, and the operation are up to the caller.
#[derive(Debug, Default, Clone)]
pub struct EnvelopeBuilder {
    version: Option<String>,
    msg_id: Option<String>,
    ts: Option<String>,
    from: Option<String>,
    to: Option<String>,
    op: Option<OperationType>,
    capabilities: Option<BTreeMap<String, String>>,
    schema_uri: Option<String>,
    accept: Option<Vec<String>>,
    payload_hint: Option<PayloadHint>,
    payload_refs: Option<Vec<BTreeMap<String, String>>>,
}

impl EnvelopeBuilder {
    /// Sets the protocol version (defaults to [`PROTOCOL_VERSION`]).
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the message id (defaults to a freshly generated one).
    #[must_use]
    pub fn msg_id(mut self, msg_id: impl Into<String>) -> Self {
        self.msg_id = Some(msg_id.into());
        self
    }

    /// Sets the creation timestamp (defaults to now).
    #[must_use]
    pub fn ts(mut self, ts: impl Into<String>) -> Self {
        self.ts = Some(ts.into());
        self
    }

    /// Sets the sender logical id.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the recipient logical id.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Sets the operation kind.
    #[must_use]
    pub fn operation(mut self, op: OperationType) -> Self {
        self.op = Some(op);
        self
    }

    /// Adds a single capability entry.
    #[must_use]
    pub fn capability(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.capabilities
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replaces the capability map.
    #[must_use]
    pub fn capabilities(mut self, capabilities: BTreeMap<String, String>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Sets the payload schema URI.
    #[must_use]
    pub fn schema_uri(mut self, uri: impl Into<String>) -> Self {
        self.schema_uri = Some(uri.into());
        self
    }

    /// Sets the acceptable response encodings.
    #[must_use]
    pub fn accept(mut self, accept: Vec<String>) -> Self {
        self.accept = Some(accept);
        self
    }

    /// Sets the payload hint.
    #[must_use]
    pub fn payload_hint(mut self, hint: PayloadHint) -> Self {
        self.payload_hint = Some(hint);
        self
    }

    /// Adds one payload reference entry.
    #[must_use]
    pub fn payload_ref(mut self, entry: BTreeMap<String, String>) -> Self {
        self.payload_refs.get_or_insert_with(Vec::new).push(entry);
        self
    }

    /// Builds the envelope, applying defaults and validating invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] if `from`, `to`, or the
    /// operation is missing or empty.
    pub fn build(self) -> Result<Envelope> {
        let from = self
            .from
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ProtocolError::invalid_argument("envelope requires a sender"))?;
        let to = self
            .to
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ProtocolError::invalid_argument("envelope requires a recipient"))?;
        let op = self
            .op
            .ok_or_else(|| ProtocolError::invalid_argument("envelope requires an operation"))?;

        let envelope = Envelope {
            version: self.version.unwrap_or_else(|| PROTOCOL_VERSION.to_string()),
            msg_id: self.msg_id.unwrap_or_else(generate_message_id),
            ts: self.ts.unwrap_or_else(timestamp_now),
            from,
            to,
            op,
            capabilities: self.capabilities,
            schema_uri: self.schema_uri,
            accept: self.accept,
            payload_hint: self.payload_hint,
            payload_refs: self.payload_refs,
        };
        envelope.validate()?;
        Ok(envelope)
    }
}

/// Returns the current time as RFC 3339 UTC with millisecond precision,
/// e.g. `2024-01-01T00:00:00.000Z`.
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Generates a message id of the form `msg-<epoch_ms>-<ddd>` where `ddd` is a
/// zero-padded random integer in `[0, 999]`.
///
/// Uniqueness is best-effort within a single sender's lifetime; a collision
/// is benign because there is no global uniqueness contract.
#[must_use]
pub fn generate_message_id() -> String {
    use rand::Rng;
    let epoch_ms = Utc::now().timestamp_millis();
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("msg-{epoch_ms}-{suffix:03}")
}
