//! Content hashes, script hashes, and the public key wrapper.

use parity_scale_codec::{Decode, Encode, Error as CodecError, Input, Output};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A 32-byte content hash (block hash, transaction hash, asset id, ...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Hash256(pub [u8; 32]);

/// A 20-byte script hash (RIPEMD160(SHA256(script))).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Hash160(pub [u8; 20]);

/// A secp256r1 public key in SEC1 compressed form (33 bytes).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PubKey(pub [u8; 33]);

impl Hash256 {
    /// The all-zero hash, used as `prev_hash` of the genesis block.
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Interprets the hash as a big-endian 256-bit unsigned integer, for the
    /// tertiary mempool eviction ordering key (spec.md §4.4).
    pub fn as_be_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl PartialOrd for Hash256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hash256 {
    fn cmp(&self, other: &Self) -> Ordering {
        // Big-endian byte comparison is numeric comparison for fixed-width
        // arrays; this is the ordering spec.md's mempool eviction key needs.
        self.0.cmp(&other.0)
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(v: [u8; 32]) -> Self {
        Hash256(v)
    }
}

impl From<[u8; 20]> for Hash160 {
    fn from(v: [u8; 20]) -> Self {
        Hash160(v)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Hash160 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Encode for Hash256 {
    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        dest.write(&self.0);
    }
}
impl Decode for Hash256 {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let mut buf = [0u8; 32];
        input.read(&mut buf)?;
        Ok(Hash256(buf))
    }
}

impl Encode for Hash160 {
    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        dest.write(&self.0);
    }
}
impl Decode for Hash160 {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let mut buf = [0u8; 20];
        input.read(&mut buf)?;
        Ok(Hash160(buf))
    }
}

impl Encode for PubKey {
    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        dest.write(&self.0);
    }
}
impl Decode for PubKey {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let mut buf = [0u8; 33];
        input.read(&mut buf)?;
        Ok(PubKey(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash256_ord_is_big_endian_numeric() {
        let low = Hash256([0u8; 32]);
        let mut high_bytes = [0u8; 32];
        high_bytes[31] = 1;
        let high = Hash256(high_bytes);
        assert!(low < high);
    }
}
