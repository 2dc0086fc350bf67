//! Local error type for `ledger-crypto`.

use ledger_types::error::ErrorCode;
use thiserror::Error;

/// Errors raised while signing, verifying, or deriving script hashes.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A public key or signature failed to parse from its byte encoding.
    #[error("invalid key or signature encoding: {0}")]
    InvalidEncoding(String),
    /// Signature verification failed.
    #[error("signature verification failed")]
    VerificationFailed,
    /// A multi-signature script's `m`-of-`n` parameters were inconsistent
    /// (e.g. `m == 0`, or `m > n`).
    #[error("invalid multisig parameters: m={m}, n={n}")]
    InvalidMultisigParams {
        /// Required signature count.
        m: usize,
        /// Total key count.
        n: usize,
    },
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidEncoding(_) => "CRYPTO_INVALID_ENCODING",
            Self::VerificationFailed => "CRYPTO_VERIFICATION_FAILED",
            Self::InvalidMultisigParams { .. } => "CRYPTO_INVALID_MULTISIG_PARAMS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_carries_a_distinct_code() {
        let a = CryptoError::InvalidEncoding("x".into()).code();
        let b = CryptoError::VerificationFailed.code();
        let c = CryptoError::InvalidMultisigParams { m: 1, n: 2 }.code();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }
}
