//! The `prometheus`-backed [`MetricsSink`] implementation.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{register_gauge, register_int_counter, Gauge, IntCounter};

static MEMPOOL_SIZE: OnceCell<Gauge> = OnceCell::new();
static CHAIN_HEIGHT: OnceCell<Gauge> = OnceCell::new();
static BLOCKS_PERSISTED_TOTAL: OnceCell<IntCounter> = OnceCell::new();

/// The installed Prometheus sink. Zero-sized; all state lives in the
/// registry's global statics.
#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Panics if `install` has not run, which indicates a startup ordering bug
/// rather than a condition callers should recover from.
macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("prometheus sink not initialized, call ledger_telemetry::prometheus_sink::install() first")
    };
}

impl MetricsSink for PrometheusSink {
    fn set_mempool_size(&self, size: f64) {
        get_metric!(MEMPOOL_SIZE).set(size);
    }
    fn set_chain_height(&self, height: u32) {
        get_metric!(CHAIN_HEIGHT).set(f64::from(height));
    }
    fn inc_blocks_persisted(&self) {
        get_metric!(BLOCKS_PERSISTED_TOTAL).inc();
    }
}

/// Registers every collector and installs the sink as the process-wide
/// [`MetricsSink`]. Must be called exactly once, before any metric is
/// reported.
#[allow(clippy::expect_used)]
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    MEMPOOL_SIZE
        .set(register_gauge!(
            "ledger_mempool_size",
            "Current number of transactions in the mempool."
        )?)
        .expect("static already initialized");
    CHAIN_HEIGHT
        .set(register_gauge!(
            "ledger_chain_height",
            "Current persisted chain height."
        )?)
        .expect("static already initialized");
    BLOCKS_PERSISTED_TOTAL
        .set(register_int_counter!(
            "ledger_blocks_persisted_total",
            "Total number of blocks persisted."
        )?)
        .expect("static already initialized");

    static SINK: PrometheusSink = PrometheusSink;
    let _ = crate::sinks::SINK.set(&SINK);
    Ok(&SINK)
}
