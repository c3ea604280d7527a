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

//! Envelope <-> JSON codec.
//!
//! The on-wire form is a UTF-8 JSON object whose keys are exactly the
//! envelope field names. Unset optional fields are omitted (never emitted as
//! `null`), and the operation enum is serialized as its numeric ordinal.
//! Within this implementation key order is stable for a given envelope, which
//! the canonical hash relies on.

use crate::envelope::Envelope;
use crate::error::{ProtocolError, Result};

/// Serializes an envelope to its canonical UTF-8 JSON bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::SerializationFailed`] if encoding fails.
///
/// # Examples
///
/// ```rust
/// use umicp::envelope::Envelope;
/// use umicp::serialization::json::{deserialize_envelope, serialize_envelope};
/// use umicp::types::OperationType;
///
/// let envelope = Envelope::builder()
///     .from("a")
///     .to("b")
///     .operation(OperationType::Control)
///     .build()
///     .unwrap();
///
/// let bytes = serialize_envelope(&envelope).unwrap();
/// assert_eq!(deserialize_envelope(&bytes).unwrap(), envelope);
/// ```
pub fn serialize_envelope(envelope: &Envelope) -> Result<Vec<u8>> {
    serde_json::to_vec(envelope).map_err(|error| ProtocolError::SerializationFailed {
        reason: error.to_string(),
    })
}

/// Deserializes an envelope from UTF-8 JSON bytes.
///
/// Unknown top-level keys are ignored. Missing required fields, empty
/// required fields, and out-of-range enum ordinals yield
/// [`ProtocolError::InvalidEnvelope`]; malformed JSON yields
/// [`ProtocolError::SerializationFailed`].
pub fn deserialize_envelope(data: &[u8]) -> Result<Envelope> {
    let envelope: Envelope = serde_json::from_slice(data).map_err(ProtocolError::from)?;
    envelope.validate()?;
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::{EncodingType, OperationType, PayloadHint, PayloadType};
    use std::collections::BTreeMap;

    fn sample_envelope() -> Envelope {
        Envelope::builder()
            .version("1.0")
            .msg_id("msg-1-001")
            .ts("2024-01-01T00:00:00.000Z")
            .from("A")
            .to("B")
            .operation(OperationType::Control)
            .build()
            .unwrap()
    }

    #[test]
    fn test_round_trip_required_fields() {
        let envelope = sample_envelope();
        let bytes = serialize_envelope(&envelope).unwrap();
        let decoded = deserialize_envelope(&bytes).unwrap();

        assert_eq!(decoded.version, "1.0");
        assert_eq!(decoded.msg_id, "msg-1-001");
        assert_eq!(decoded.ts, "2024-01-01T00:00:00.000Z");
        assert_eq!(decoded.from, "A");
        assert_eq!(decoded.to, "B");
        assert_eq!(decoded.op, OperationType::Control);
    }

    #[test]
    fn test_round_trip_optional_fields() {
        let mut capabilities = BTreeMap::new();
        capabilities.insert("k".to_string(), "v".to_string());
        let mut reference = BTreeMap::new();
        reference.insert("message_id".to_string(), "msg-1-001".to_string());
        reference.insert("status".to_string(), "OK".to_string());

        let envelope = Envelope::builder()
            .from("a")
            .to("b")
            .operation(OperationType::Ack)
            .capabilities(capabilities.clone())
            .schema_uri("https://example.com/schema")
            .accept(vec!["application/json".to_string()])
            .payload_hint(
                PayloadHint::new(PayloadType::Vector)
                    .with_size(64)
                    .with_encoding(EncodingType::Float32)
                    .with_count(16),
            )
            .payload_ref(reference.clone())
            .build()
            .unwrap();

        let bytes = serialize_envelope(&envelope).unwrap();
        let decoded = deserialize_envelope(&bytes).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.capabilities, Some(capabilities));
        assert_eq!(decoded.payload_refs, Some(vec![reference]));
    }

    #[test]
    fn test_absent_optionals_are_omitted_not_null() {
        let bytes = serialize_envelope(&sample_envelope()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("null"));
        assert!(!text.contains("capabilities"));
        assert!(!text.contains("payload_hint"));
        assert!(!text.contains("payload_refs"));
    }

    #[test]
    fn test_operation_serializes_as_ordinal() {
        let bytes = serialize_envelope(&sample_envelope()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""op":0"#));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let json = br#"{"version":"1.0","msg_id":"m","ts":"t","from":"a","to":"b","op":1,"future_field":true}"#;
        let decoded = deserialize_envelope(json).unwrap();
        assert_eq!(decoded.op, OperationType::Data);
    }

    #[test]
    fn test_missing_required_field_is_invalid_envelope() {
        let json = br#"{"version":"1.0","msg_id":"m","ts":"t","from":"a","op":1}"#;
        let error = deserialize_envelope(json).unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidEnvelope);
    }

    #[test]
    fn test_empty_required_field_is_invalid_envelope() {
        let json = br#"{"version":"1.0","msg_id":"","ts":"t","from":"a","to":"b","op":1}"#;
        let error = deserialize_envelope(json).unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidEnvelope);
    }

    #[test]
    fn test_out_of_range_operation_is_invalid_envelope() {
        let json = br#"{"version":"1.0","msg_id":"m","ts":"t","from":"a","to":"b","op":9}"#;
        let error = deserialize_envelope(json).unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidEnvelope);
    }

    #[test]
    fn test_malformed_json_is_serialization_failure() {
        let error = deserialize_envelope(b"{broken").unwrap_err();
        assert_eq!(error.code(), ErrorCode::SerializationFailed);
    }

    #[test]
    fn test_stable_output_for_equal_envelopes() {
        let envelope = sample_envelope();
        let first = serialize_envelope(&envelope).unwrap();
        let second = serialize_envelope(&envelope).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_documented_wire_example() {
        let json = br#"{"version":"1.0","msg_id":"msg-1700000000000-042","ts":"2023-11-14T22:13:20.000Z","from":"a","to":"b","op":1,"capabilities":{"k":"v"}}"#;
        let decoded = deserialize_envelope(json).unwrap();
        assert_eq!(decoded.msg_id, "msg-1700000000000-042");
        assert_eq!(decoded.op, OperationType::Data);
        assert_eq!(
            decoded
                .capabilities
                .as_ref()
                .and_then(|caps| caps.get("k"))
                .map(String::as_str),
            Some("v")
        );
    }
}
