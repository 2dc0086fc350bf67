//! The metrics contract: the dispatcher and persist engine call this trait,
//! never `prometheus` directly, so the backend can be swapped or disabled.

use once_cell::sync::OnceCell;

/// A no-op sink, used before [`crate::prometheus_sink::install`] has run and
/// in tests.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// The process-wide sink, set once by [`crate::prometheus_sink::install`].
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns the installed sink, or a no-op sink if none has been installed.
pub fn metrics() -> &'static dyn MetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Metrics reported by the ledger kernel (spec.md §8, `SPEC_FULL.md` §1).
pub trait MetricsSink: Send + Sync + std::fmt::Debug {
    /// Sets the current number of transactions held in the mempool.
    fn set_mempool_size(&self, size: f64);
    /// Sets the current persisted chain height.
    fn set_chain_height(&self, height: u32);
    /// Increments the counter of blocks persisted.
    fn inc_blocks_persisted(&self);
}

impl MetricsSink for NopSink {
    fn set_mempool_size(&self, _size: f64) {}
    fn set_chain_height(&self, _height: u32) {}
    fn inc_blocks_persisted(&self) {}
}
