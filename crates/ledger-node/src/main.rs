#![forbid(unsafe_code)]

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::LedgerConfig;
use ledger_core::vm::NullEngine;
use ledger_core::{AllowAllPolicy, Blockchain, BlockchainConfig, BlockchainHandle, Notification, NullSink};
use ledger_storage::redb_store::RedbStore;
use ledger_storage::Store;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "ledger-node", about = "UTXO ledger kernel node")]
struct Cli {
    /// Path to a TOML config file. Missing fields fall back to defaults.
    #[arg(long, default_value = "ledger.toml")]
    config: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    ledger_telemetry::init::init_tracing()?;

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        LedgerConfig::load(&cli.config)?
    } else {
        tracing::warn!(path = %cli.config.display(), "no config file found, using defaults");
        LedgerConfig::default()
    };

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;
    let db_path = config.data_dir.join("ledger.redb");
    let store: Arc<dyn Store> = Arc::new(RedbStore::open(&db_path).with_context(|| format!("opening store at {}", db_path.display()))?);

    let standby_validators = config.standby_validator_keys()?;
    let chain_config = BlockchainConfig {
        standby_validators,
        mempool_capacity: config.mempool_capacity,
        relay_window: config.relay_window,
    };

    let (blockchain, handle) = Blockchain::new(
        store,
        chain_config,
        Arc::new(NullEngine),
        Arc::new(NullSink),
        Arc::new(AllowAllPolicy),
    )
    .map_err(|e| anyhow::anyhow!("failed to open ledger: {e}"))?;

    let metrics_sink = ledger_telemetry::prometheus_sink::install().context("installing prometheus metrics")?;
    let metrics_addr: SocketAddr = config
        .metrics_addr
        .parse()
        .with_context(|| format!("parsing metrics_addr {}", config.metrics_addr))?;

    let actor_task = tokio::spawn(blockchain.run());
    let metrics_server_task = tokio::spawn(ledger_telemetry::http::run_server(metrics_addr));
    let metrics_feed_task = tokio::spawn(feed_metrics(handle.clone(), metrics_sink));

    tracing::info!(data_dir = %config.data_dir.display(), metrics_addr = %metrics_addr, "ledger node started");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        res = actor_task => {
            if let Err(e) = res {
                tracing::error!(error = %e, "blockchain actor task panicked");
            }
        }
    }

    metrics_server_task.abort();
    metrics_feed_task.abort();
    Ok(())
}

/// Bridges the dispatcher's subscriber notifications and the mempool's
/// polled size into the process-wide metrics sink (`SPEC_FULL.md` §1
/// "Metrics").
async fn feed_metrics(handle: BlockchainHandle, sink: &'static dyn ledger_telemetry::MetricsSink) {
    let (_id, mut notifications) = handle.register().await;
    let mut mempool_ticker = tokio::time::interval(std::time::Duration::from_secs(5));

    loop {
        tokio::select! {
            notification = notifications.recv() => {
                match notification {
                    Some(Notification::PersistCompleted { height, .. }) => {
                        sink.set_chain_height(height);
                        sink.inc_blocks_persisted();
                    }
                    Some(Notification::ApplicationExecuted(_)) => {}
                    None => break,
                }
            }
            _ = mempool_ticker.tick() => {
                sink.set_mempool_size(handle.mempool().len() as f64);
            }
        }
    }
}
