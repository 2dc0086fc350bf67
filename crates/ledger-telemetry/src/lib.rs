#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! Observability for the ledger kernel: structured logging initialization, a
//! Prometheus metrics registry, and an abstract sink so the dispatcher and
//! persist engine can report metrics without depending on the backend.

/// A lightweight HTTP server exposing `/metrics`, `/healthz`, and `/readyz`.
pub mod http;
/// The global `tracing` subscriber init routine.
pub mod init;
/// The concrete `prometheus`-backed `MetricsSink`.
pub mod prometheus_sink;
/// Abstract `MetricsSink` trait, decoupling instrumentation from the backend.
pub mod sinks;

pub use sinks::{metrics, MetricsSink, NopSink};
