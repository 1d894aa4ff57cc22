//! Network identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies which name-system network the wallet is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    Main,
    /// The public test network.
    Testnet,
    /// Local regression-test network.
    Regtest,
    /// Local simulation network.
    Simnet,
}

impl NetworkId {
    /// Human-readable prefix used in address strings.
    pub fn address_hrp(&self) -> &'static str {
        match self {
            Self::Main => "hs",
            Self::Testnet => "ts",
            Self::Regtest => "rs",
            Self::Simnet => "ss",
        }
    }

    /// Look up the network that owns an address prefix.
    pub fn from_hrp(hrp: &str) -> Option<Self> {
        match hrp {
            "hs" => Some(Self::Main),
            "ts" => Some(Self::Testnet),
            "rs" => Some(Self::Regtest),
            "ss" => Some(Self::Simnet),
            _ => None,
        }
    }

    /// Default wallet RPC port of the full node for this network.
    pub fn default_node_port(&self) -> u16 {
        match self {
            Self::Main => 12037,
            Self::Testnet => 13037,
            Self::Regtest => 14037,
            Self::Simnet => 15037,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
            Self::Simnet => "simnet",
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" | "mainnet" => Ok(Self::Main),
            "testnet" | "test" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            "simnet" => Ok(Self::Simnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}
