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

//! Security interface.
//!
//! The orchestrator consults an optional [`SecurityManager`] for
//! authentication state, session state, and payload encryption. This crate
//! defines only the session shape; the cipher and signature primitives are
//! supplied by the embedding application. No built-in implementation ships
//! here: the protocol does not mandate a cipher suite, and a toy stand-in
//! would invite production misuse.

use crate::error::Result;

/// Authenticated/encrypted session management consulted by the orchestrator.
///
/// Implementations must be safe to share across threads; the orchestrator and
/// any component consulting session state hold the same reference. All
/// methods take `&self`, so implementations use interior mutability for their
/// key and session state.
pub trait SecurityManager: Send + Sync {
    /// Generates a fresh local keypair.
    fn generate_keypair(&self) -> Result<()>;

    /// Loads an existing private key, replacing any generated one.
    fn load_private_key(&self, key: &[u8]) -> Result<()>;

    /// Sets the peer's public key for verification and session derivation.
    fn set_peer_public_key(&self, key: &[u8]) -> Result<()>;

    /// Signs `data` with the local private key.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Verifies `signature` over `data` against the peer's public key.
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool>;

    /// Encrypts `plaintext` under the established session.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts `ciphertext` under the established session.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Establishes an authenticated session with `peer_id`.
    fn establish_session(&self, peer_id: &str) -> Result<()>;

    /// Tears the session down and clears session key material.
    fn close_session(&self);

    /// Returns `true` while an encrypted session is established.
    fn has_session(&self) -> bool;

    /// Returns `true` once the peer is authenticated.
    fn is_authenticated(&self) -> bool;

    /// Returns the authenticated peer's logical id, if any.
    fn peer_id(&self) -> Option<String>;
}
