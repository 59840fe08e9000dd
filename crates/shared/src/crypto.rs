//! Hashing helpers for session bookkeeping.
//!
//! Token identifiers (JTIs) are never stored in clear; sessions are looked up
//! by the SHA-256 fingerprint of the identifier.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
