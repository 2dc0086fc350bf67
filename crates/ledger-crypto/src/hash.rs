//! Script hashing: `RIPEMD160(SHA256(script))`, the address derivation
//! function for every script hash in the ledger (witness verification
//! scripts, contract scripts, consensus redeem scripts).

use ledger_types::Hash160;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Hashes `script` down to its 20-byte script hash.
pub fn script_hash(script: &[u8]) -> Hash160 {
    let sha = Sha256::digest(script);
    let ripemd = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd);
    Hash160(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_hash_is_deterministic_and_20_bytes() {
        let a = script_hash(b"a redeem script");
        let b = script_hash(b"a redeem script");
        assert_eq!(a, b);
        let c = script_hash(b"a different script");
        assert_ne!(a, c);
    }
}
