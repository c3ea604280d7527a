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

//! Canonical envelope hashing.
//!
//! The canonical form is the required fields only, joined in fixed order
//! (version, msg_id, ts, from, to, operation ordinal) with a `|` separator,
//! hashed with 64-bit FNV-1a and rendered as 16 lowercase hex digits.
//!
//! The digest is an identity summary for local deduplication, not a
//! signature and not a cross-implementation contract. It is stable across
//! versions of this crate.

use crate::envelope::Envelope;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Computes the 64-bit FNV-1a digest of a byte string.
#[must_use]
pub fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Renders the canonical form of an envelope.
#[must_use]
pub fn canonical_form(envelope: &Envelope) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}",
        envelope.version,
        envelope.msg_id,
        envelope.ts,
        envelope.from,
        envelope.to,
        envelope.op.as_u8()
    )
}

/// Hashes an envelope's canonical form to 16 lowercase hex digits.
///
/// # Examples
///
/// ```rust
/// use umicp::envelope::Envelope;
/// use umicp::serialization::hash::envelope_hash;
/// use umicp::types::OperationType;
///
/// let envelope = Envelope::builder()
///     .from("a")
///     .to("b")
///     .operation(OperationType::Control)
///     .build()
///     .unwrap();
///
/// let digest = envelope_hash(&envelope);
/// assert_eq!(digest.len(), 16);
/// assert_eq!(digest, envelope_hash(&envelope));
/// ```
#[must_use]
pub fn envelope_hash(envelope: &Envelope) -> String {
    format!("{:016x}", fnv1a_64(canonical_form(envelope).as_bytes()))
}
