#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! # Ledger kernel cryptography
//!
//! secp256r1 (P-256) signature verification, the SHA-256/RIPEMD-160 script
//! hashing pipeline, and multi-signature redeem-script / consensus-address
//! derivation used throughout the ledger (spec.md §6 "Genesis construction",
//! §4.5 witness verification).

/// Signature verification over secp256r1.
pub mod sign;
/// Content and script hashing (`SHA256`, `RIPEMD160`).
pub mod hash;
/// Multi-signature redeem scripts and the Byzantine-quorum threshold rule.
pub mod multisig;
/// The crate-wide error type.
pub mod error;

pub use error::CryptoError;
