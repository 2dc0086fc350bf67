use anyhow::{Context, Result};
use ledger_types::PubKey;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Node configuration, loaded from a TOML file (`SPEC_FULL.md` §1
/// "Configuration").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory the `redb` store lives under. `ledger.redb` is created
    /// inside it on first run.
    pub data_dir: PathBuf,
    /// Upper bound on the number of transactions the mempool will hold
    /// (spec.md §4.4 `capacity`).
    pub mempool_capacity: usize,
    /// Network magic number, distinguishing incompatible chains at the wire
    /// level. Unused by this crate beyond being surfaced for future P2P
    /// wiring (spec.md §1 Non-goals: full P2P is out of scope).
    pub network_magic: u32,
    /// Target spacing between blocks, in seconds.
    pub seconds_per_block: u64,
    /// How many blocks behind the pre-persist header tip a freshly
    /// persisted chain may still be relayed from (spec.md §4.6 `OnPersistCompleted`).
    pub relay_window: u32,
    /// Hex-encoded SEC1-compressed public keys of the standby validator set
    /// used to derive the genesis `next_consensus` address (spec.md §6).
    pub standby_validators: Vec<String>,
    /// Address the `/metrics`, `/healthz`, `/readyz` HTTP server binds to.
    pub metrics_addr: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./ledger-data"),
            mempool_capacity: ledger_types::constants::MEMPOOL_MAX,
            network_magic: 0x4e45_4f33,
            seconds_per_block: ledger_types::constants::SECONDS_PER_BLOCK,
            relay_window: 100,
            standby_validators: Vec::new(),
            metrics_addr: "127.0.0.1:9090".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Loads a config from `path`, falling back to defaults for any field
    /// the file omits.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Decodes [`Self::standby_validators`] into [`PubKey`]s.
    pub fn standby_validator_keys(&self) -> Result<Vec<PubKey>> {
        self.standby_validators
            .iter()
            .map(|hex_key| {
                let bytes = hex::decode(hex_key).with_context(|| format!("decoding standby validator key {hex_key}"))?;
                let array: [u8; 33] = bytes
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("standby validator key {hex_key} is not 33 bytes"))?;
                Ok(PubKey(array))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_decode_to_an_empty_validator_set() {
        let config = LedgerConfig::default();
        assert!(config.standby_validator_keys().unwrap_or_default().is_empty());
    }

    #[test]
    fn rejects_a_malformed_hex_key() {
        let mut config = LedgerConfig::default();
        config.standby_validators.push("not-hex".to_string());
        assert!(config.standby_validator_keys().is_err());
    }
}
