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

//! # Ledger kernel mempool
//!
//! A bounded, concurrent, fee-density-prioritized pool of pending
//! transactions (spec.md §4.4 "C4"). Unlike an account/nonce mempool,
//! UTXO transactions have no ordering dependency on each other, so
//! admission and eviction both reduce to a single global priority order:
//! `(network_fee / size, network_fee, hash)` ascending — the lowest-priority
//! transaction is evicted first when the pool is full.

mod key;
mod pool;

pub use key::EvictionKey;
pub use pool::{AddOutcome, Mempool};

pub use ledger_types::error::MempoolError;
