//! Multi-signature redeem scripts and the consensus quorum rule.
//!
//! A validator set's `next_consensus` script hash (spec.md §3 `BlockHeader`)
//! is the script hash of an `m`-of-`n` multi-sig redeem script built from
//! the validator public keys, with `m` fixed at the Byzantine quorum
//! `n - (n - 1) / 3` (spec.md §6 "Genesis construction").

use crate::error::CryptoError;
use crate::hash::script_hash;
use ledger_types::{Hash160, PubKey};

/// The minimum number of signatures required to tolerate `f` faulty
/// validators out of `n = 3f + 1`: `n - (n - 1) / 3`.
pub fn byzantine_quorum(n: usize) -> usize {
    n - (n.saturating_sub(1)) / 3
}

/// Builds the canonical `m`-of-`n` multi-sig redeem script for `pubkeys`,
/// sorted into a deterministic order so the same validator set always
/// produces the same script regardless of input ordering.
///
/// The script itself is opaque to the ledger; only its hash matters. We
/// model it as the length-prefixed concatenation of `m` and the sorted
/// public keys, which is sufficient for hashing and witness-script
/// equality checks without depending on a virtual machine's instruction
/// encoding.
pub fn build_redeem_script(pubkeys: &[PubKey], m: usize) -> Result<Vec<u8>, CryptoError> {
    let n = pubkeys.len();
    if m == 0 || m > n {
        return Err(CryptoError::InvalidMultisigParams { m, n });
    }
    let mut sorted: Vec<&PubKey> = pubkeys.iter().collect();
    sorted.sort_by_key(|pk| pk.0);

    let mut script = Vec::with_capacity(1 + n * 33);
    script.push(m as u8);
    for pubkey in sorted {
        script.extend_from_slice(&pubkey.0);
    }
    script.push(n as u8);
    Ok(script)
}

/// The minimum number of signatures for a plain majority of `n` signers:
/// `ceil((n + 1) / 2)`. Used for the genesis governing-token issuance
/// address, which is a simple-majority multi-sig rather than a Byzantine
/// quorum (spec.md §6 "Genesis construction").
pub fn majority_quorum(n: usize) -> usize {
    (n + 1).div_ceil(2)
}

/// Derives the script hash of an `m`-of-`n` multi-sig address for
/// `pubkeys`, for any quorum rule `m`.
pub fn multisig_address(pubkeys: &[PubKey], m: usize) -> Result<Hash160, CryptoError> {
    let script = build_redeem_script(pubkeys, m)?;
    Ok(script_hash(&script))
}

/// Derives the consensus address (script hash) for a validator set, using
/// the Byzantine quorum as `m`.
pub fn consensus_address(pubkeys: &[PubKey]) -> Result<Hash160, CryptoError> {
    multisig_address(pubkeys, byzantine_quorum(pubkeys.len()))
}

/// Recovers `(m, sorted_pubkeys)` from a redeem script built by
/// [`build_redeem_script`]. The reverse of that function's own encoding, so
/// witness verification never needs a general-purpose script interpreter
/// for the one script shape the ledger itself produces.
pub fn parse_redeem_script(script: &[u8]) -> Result<(usize, Vec<PubKey>), CryptoError> {
    if script.len() < 2 {
        return Err(CryptoError::InvalidEncoding("redeem script too short".into()));
    }
    let m = script[0] as usize;
    let n = *script.last().ok_or_else(|| CryptoError::InvalidEncoding("empty redeem script".into()))? as usize;
    let expected_len = 1 + n * 33 + 1;
    if script.len() != expected_len || m == 0 || m > n {
        return Err(CryptoError::InvalidMultisigParams { m, n });
    }
    let pubkeys = script[1..1 + n * 33]
        .chunks_exact(33)
        .map(|chunk| {
            let mut bytes = [0u8; 33];
            bytes.copy_from_slice(chunk);
            PubKey(bytes)
        })
        .collect();
    Ok((m, pubkeys))
}

/// Verifies a multi-sig witness: `verification_script` must parse to an
/// `m`-of-`n` redeem script, and `invocation_script` must hold at least `m`
/// fixed 64-byte signatures over `message`, each matching a distinct one of
/// the script's leading `m` sorted public keys in order (the same order a
/// signer following [`build_redeem_script`]'s canonical sort would produce).
pub fn verify_multisig_witness(
    verification_script: &[u8],
    invocation_script: &[u8],
    message: &[u8],
) -> Result<(), CryptoError> {
    let (m, pubkeys) = parse_redeem_script(verification_script)?;
    if invocation_script.len() != m * 64 {
        return Err(CryptoError::VerificationFailed);
    }
    for (i, signature) in invocation_script.chunks_exact(64).enumerate() {
        let pubkey = pubkeys.get(i).ok_or(CryptoError::VerificationFailed)?;
        crate::sign::verify(pubkey, message, signature)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_matches_classic_bft_thresholds() {
        assert_eq!(byzantine_quorum(4), 3);
        assert_eq!(byzantine_quorum(7), 5);
        assert_eq!(byzantine_quorum(1), 1);
    }

    #[test]
    fn majority_quorum_rounds_up() {
        assert_eq!(majority_quorum(4), 3);
        assert_eq!(majority_quorum(7), 4);
        assert_eq!(majority_quorum(1), 1);
    }

    #[test]
    fn redeem_script_rejects_impossible_thresholds() {
        let pubkeys = vec![PubKey([1; 33]), PubKey([2; 33])];
        assert!(build_redeem_script(&pubkeys, 0).is_err());
        assert!(build_redeem_script(&pubkeys, 3).is_err());
    }

    #[test]
    fn consensus_address_is_order_independent() {
        let a = PubKey([1; 33]);
        let b = PubKey([2; 33]);
        let forward = consensus_address(&[a, b]).expect("valid quorum");
        let reverse = consensus_address(&[b, a]).expect("valid quorum");
        assert_eq!(forward, reverse);
    }

    #[test]
    fn parse_redeem_script_round_trips_build_redeem_script() {
        let a = PubKey([1; 33]);
        let b = PubKey([2; 33]);
        let script = build_redeem_script(&[a, b], 2).expect("build");
        let (m, pubkeys) = parse_redeem_script(&script).expect("parse");
        assert_eq!(m, 2);
        assert_eq!(pubkeys, vec![a, b]);
    }

    #[test]
    fn verify_multisig_witness_accepts_enough_valid_signatures() {
        use crate::sign::KeyPair;
        let pair_a = KeyPair::generate();
        let pair_b = KeyPair::generate();
        let mut pubkeys = vec![pair_a.public_key(), pair_b.public_key()];
        pubkeys.sort_by_key(|pk| pk.0);
        let script = build_redeem_script(&pubkeys, 2).expect("build");
        let message = b"block header content";

        let sig_for = |pk: &PubKey| -> Vec<u8> {
            if *pk == pair_a.public_key() {
                pair_a.sign(message)
            } else {
                pair_b.sign(message)
            }
        };
        let invocation: Vec<u8> = pubkeys.iter().flat_map(sig_for).collect();

        verify_multisig_witness(&script, &invocation, message).expect("valid witness must verify");
    }

    #[test]
    fn verify_multisig_witness_rejects_short_invocation_script() {
        let a = PubKey([1; 33]);
        let b = PubKey([2; 33]);
        let script = build_redeem_script(&[a, b], 2).expect("build");
        assert!(verify_multisig_witness(&script, &[0u8; 64], b"msg").is_err());
    }
}
