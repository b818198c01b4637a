//! Producer authentication.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Constant-time check of a producer-supplied key against the shared secret.
///
/// Both sides are digested first so neither content nor length leaks through timing.
pub fn verify_key(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided.as_slice().ct_eq(expected.as_slice()).into()
}

/// Pull `key` out of a decoded producer frame and check it. Missing or non-string keys fail.
pub fn authenticate(frame: &serde_json::Value, expected: &str) -> bool {
    match frame.get("key").and_then(|v| v.as_str()) {
        Some(key) => verify_key(key, expected),
        None => false,
    }
}
