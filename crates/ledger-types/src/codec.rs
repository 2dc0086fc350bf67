//! The canonical binary codec.
//!
//! Persisted records use `parity-scale-codec`'s compact, length-prefixed
//! encoding for variable-length fields (`Vec<T>`, `String`), matching
//! spec.md's "fixed field order, length-prefixed variable fields"
//! requirement while giving every entity a derive-generated, backward
//! compatible layout (new trailing fields can be added without breaking old
//! readers, as SCALE struct encoding is purely positional).

use crate::hash::Hash256;
use sha2::{Digest, Sha256};

/// Double SHA-256, the content-hash function used for block and transaction
/// identities throughout the ledger.
pub fn double_sha256(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    Hash256(out)
}

/// Encodes a value with the canonical codec.
pub fn encode<T: parity_scale_codec::Encode>(value: &T) -> Vec<u8> {
    value.encode()
}

/// Decodes a value with the canonical codec.
pub fn decode<T: parity_scale_codec::Decode>(bytes: &[u8]) -> Result<T, crate::error::StateError> {
    T::decode(&mut &bytes[..]).map_err(|e| crate::error::StateError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_sha256_is_deterministic() {
        assert_eq!(double_sha256(b"abc"), double_sha256(b"abc"));
        assert_ne!(double_sha256(b"abc"), double_sha256(b"abd"));
    }
}
