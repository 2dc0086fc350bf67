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

//! # Ledger kernel core
//!
//! Everything that turns the primitive crates (`ledger-types`,
//! `ledger-crypto`, `ledger-storage`, `ledger-state`, `ledger-mempool`) into
//! a running ledger: deterministic genesis construction, the header chain
//! manager, block/header/transaction validation, the deterministic persist
//! engine, the VM sandbox seam, and the single-threaded ingestion dispatcher
//! that wires all of it together behind one actor.

/// Deterministic genesis block construction.
pub mod genesis;
/// The in-memory header chain manager.
pub mod header_chain;
/// Block, header, and transaction validation.
pub mod validate;
/// The deterministic per-block persist engine.
pub mod persist;
/// The VM sandbox seam and its null fallback.
pub mod vm;
/// The ingestion dispatcher: the `Blockchain` actor and its handle.
pub mod dispatcher;

pub use dispatcher::{
    AllowAllPolicy, Blockchain, BlockchainConfig, BlockchainHandle, ConsensusPayload, Notification,
    NullSink, OutboundSink, PolicyEngine, RelayResultReason,
};
