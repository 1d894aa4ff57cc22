//! Wallet configuration with TOML file support.

use hnsw_types::NetworkId;
use hnsw_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::WalletError;

/// Configuration for the resync engine and the settlement protocol.
///
/// Can be loaded from a TOML file via [`WalletConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Which network the wallet and node run on.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// JSON-RPC endpoint of the full node.
    #[serde(default = "default_node_url")]
    pub node_url: String,

    /// Tick of the `check_status` and `full_rescan` progress samplers.
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,

    /// Chain entries fetched per catch-up round.
    #[serde(default = "default_batch")]
    pub rescan_batch_size: u32,

    /// Derivation indices whose history `full_rescan` replays.
    #[serde(default = "default_address_depth")]
    pub address_depth: u32,

    /// Derivation indices the legacy rescan pre-fetches.
    #[serde(default = "default_legacy_address_limit")]
    pub legacy_address_limit: u32,

    /// Derivation indices per address-history query, for both rescans.
    #[serde(default = "default_batch")]
    pub address_batch: u32,

    /// Blocks between legacy rescan progress events.
    #[serde(default = "default_batch")]
    pub legacy_progress_every: u32,

    /// Ceiling on a finalization offer's price, in whole coins.
    #[serde(default = "default_max_offer_price_whole")]
    pub max_offer_price_whole: u64,

    #[serde(default = "default_mempool_poll_attempts")]
    pub mempool_poll_attempts: u32,

    #[serde(default = "default_mempool_poll_interval_ms")]
    pub mempool_poll_interval_ms: u64,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Regtest
}

fn default_node_url() -> String {
    format!("http://127.0.0.1:{}", NetworkId::Regtest.default_node_port())
}

fn default_status_poll_interval_ms() -> u64 {
    2_500
}

fn default_batch() -> u32 {
    1_000
}

fn default_address_depth() -> u32 {
    10_000
}

fn default_legacy_address_limit() -> u32 {
    20_000
}

fn default_max_offer_price_whole() -> u64 {
    2_000
}

fn default_mempool_poll_attempts() -> u32 {
    10
}

fn default_mempool_poll_interval_ms() -> u64 {
    3_000
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WalletConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| WalletError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, WalletError> {
        let config: Self = toml::from_str(s).map_err(|e| WalletError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("WalletConfig is always serializable to TOML")
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        let nonzero = [
            ("rescan_batch_size", self.rescan_batch_size),
            ("address_batch", self.address_batch),
            ("legacy_progress_every", self.legacy_progress_every),
            ("mempool_poll_attempts", self.mempool_poll_attempts),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(WalletError::Config(format!("{field} must be non-zero")));
            }
        }
        if self.max_offer_price_whole == 0 {
            return Err(WalletError::Config(
                "max_offer_price_whole must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn mempool_poll_interval(&self) -> Duration {
        Duration::from_millis(self.mempool_poll_interval_ms)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            node_url: default_node_url(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
            rescan_batch_size: default_batch(),
            address_depth: default_address_depth(),
            legacy_address_limit: default_legacy_address_limit(),
            address_batch: default_batch(),
            legacy_progress_every: default_batch(),
            max_offer_price_whole: default_max_offer_price_whole(),
            mempool_poll_attempts: default_mempool_poll_attempts(),
            mempool_poll_interval_ms: default_mempool_poll_interval_ms(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = WalletConfig::default();
        let parsed = WalletConfig::from_toml_str(&config.to_toml_string()).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = WalletConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.network, NetworkId::Regtest);
        assert_eq!(config.status_poll_interval(), Duration::from_millis(2500));
        assert_eq!(config.max_offer_price_whole, 2000);
        assert_eq!(config.mempool_poll_attempts, 10);
        assert_eq!(config.mempool_poll_interval(), Duration::from_millis(3000));
        assert_eq!(config.legacy_address_limit, 20_000);
        assert_eq!(config.log_format, LogFormat::Human);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            network = "main"
            rescan_batch_size = 50
            log_format = "json"
        "#;
        let config = WalletConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.network, NetworkId::Main);
        assert_eq!(config.rescan_batch_size, 50);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.address_depth, 10_000); // default
    }

    #[test]
    fn zero_batch_is_rejected() {
        let err = WalletConfig::from_toml_str("address_batch = 0").unwrap_err();
        assert!(matches!(err, WalletError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mempool_poll_attempts = 4").unwrap();
        let config = WalletConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.mempool_poll_attempts, 4);
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = WalletConfig::from_toml_file("/nonexistent/hnsw-wallet.toml");
        assert!(matches!(result, Err(WalletError::Config(_))));
    }
}
