//! JSON-RPC client for the full node.

use std::collections::HashSet;
use std::time::Duration;

use hnsw_crypto::encode_address;
use hnsw_types::{
    Address, Amount, ChainEntry, Coin, NetworkId, Outpoint, Transaction, TransactionRecord,
    TxHash,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::records::{RawChainEntry, RawCoin, RawTransaction};
use crate::{ChainClient, ChainError, ChainInfo};

/// Rate used when the node has too little data to estimate.
pub const FALLBACK_FEE_RATE: Amount = Amount::new(1_000);

/// HTTP client for the node's JSON-RPC interface.
///
/// Wraps `reqwest::Client` with the node URL, optional API key and the
/// network the wallet expects addresses to belong to.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    node_url: String,
    api_key: Option<String>,
    network: NetworkId,
}

#[derive(Debug, Deserialize)]
struct BlockchainInfo {
    blocks: u32,
    bestblockhash: String,
}

#[derive(Debug, Deserialize)]
struct FeeEstimate {
    /// Whole coins per kilobyte. Negative when the node cannot estimate.
    #[serde(default)]
    fee: f64,
}

impl NodeClient {
    /// Create a client targeting `node_url` (e.g. `http://127.0.0.1:14037`).
    pub fn new(node_url: impl Into<String>, network: NetworkId) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ChainError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            node_url: node_url.into(),
            api_key: None,
            network,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    /// Send a JSON-RPC request and return the `result` field.
    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ChainError> {
        let body = serde_json::json!({ "method": method, "params": params });
        let mut request = self.http.post(&self.node_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.basic_auth("x", Some(key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChainError::Request(format!("{method}: {e}")))?;

        if !response.status().is_success() && response.status().as_u16() != 500 {
            return Err(ChainError::Request(format!(
                "{method}: node returned HTTP {}",
                response.status()
            )));
        }

        let mut json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: invalid JSON: {e}")))?;

        match json.get("error") {
            None | Some(serde_json::Value::Null) => {}
            Some(err) => {
                let message = err
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_owned)
                    .unwrap_or_else(|| err.to_string());
                return Err(ChainError::Rpc(format!("{method}: {message}")));
            }
        }

        Ok(json
            .get_mut("result")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }

    async fn rpc_typed<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ChainError> {
        let result = self.rpc_call(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")))
    }
}

impl ChainClient for NodeClient {
    async fn chain_info(&self) -> Result<ChainInfo, ChainError> {
        let info: BlockchainInfo = self
            .rpc_typed("getblockchaininfo", serde_json::json!([]))
            .await?;
        Ok(ChainInfo {
            height: info.blocks,
            tip_hash: hnsw_types::BlockHash::from_hex("bestblockhash", &info.bestblockhash)?,
        })
    }

    async fn fee_estimate(&self) -> Result<Amount, ChainError> {
        let estimate: FeeEstimate = self
            .rpc_typed("estimatesmartfee", serde_json::json!([1]))
            .await?;
        if estimate.fee <= 0.0 || !estimate.fee.is_finite() {
            debug!("node has no fee estimate, using fallback rate");
            return Ok(FALLBACK_FEE_RATE);
        }
        Ok(Amount::new(
            (estimate.fee * Amount::COIN as f64).round() as u64
        ))
    }

    async fn entries_by_heights(&self, heights: &[u32]) -> Result<Vec<ChainEntry>, ChainError> {
        if heights.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<Option<RawChainEntry>> = self
            .rpc_typed("getentriesbyheights", serde_json::json!([heights]))
            .await?;
        let mut entries = raw
            .into_iter()
            .flatten()
            .map(|e| e.decode())
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|e| e.height);
        Ok(entries)
    }

    async fn transactions_by_addresses(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<TransactionRecord>, ChainError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let encoded: Vec<String> = addresses
            .iter()
            .map(|a| encode_address(a, self.network))
            .collect();
        let raw: Vec<RawTransaction> = self
            .rpc_typed("gettxbyaddresses", serde_json::json!([encoded]))
            .await?;
        raw.iter()
            .map(|tx| tx.decode(self.network).map_err(ChainError::from))
            .collect()
    }

    async fn coin(&self, outpoint: &Outpoint) -> Result<Option<Coin>, ChainError> {
        let raw: Option<RawCoin> = self
            .rpc_typed(
                "gettxout",
                serde_json::json!([outpoint.hash.to_string(), outpoint.index]),
            )
            .await?;
        raw.map(|c| c.decode(self.network).map_err(ChainError::from))
            .transpose()
    }

    async fn raw_mempool(&self) -> Result<HashSet<TxHash>, ChainError> {
        let raw: Vec<String> = self
            .rpc_typed("getrawmempool", serde_json::json!([false]))
            .await?;
        raw.iter()
            .map(|h| TxHash::from_hex(h).map_err(ChainError::from))
            .collect()
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<(), ChainError> {
        match self
            .rpc_call("sendrawtransaction", serde_json::json!([tx.to_hex()]))
            .await
        {
            Ok(_) => Ok(()),
            Err(ChainError::Rpc(reason)) => {
                warn!(%reason, "node rejected transaction");
                Err(ChainError::Rejected(reason))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_client_creation() {
        let client = NodeClient::new("http://127.0.0.1:14037", NetworkId::Regtest).unwrap();
        assert_eq!(client.node_url(), "http://127.0.0.1:14037");
        assert_eq!(client.network(), NetworkId::Regtest);
        assert!(client.api_key.is_none());

        let client = client.with_api_key("secret");
        assert_eq!(client.api_key.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn unreachable_node_is_a_request_error() {
        let client = NodeClient::new("http://127.0.0.1:1", NetworkId::Regtest).unwrap();
        let err = client.chain_info().await.unwrap_err();
        assert!(matches!(err, ChainError::Request(_)));
    }

    #[tokio::test]
    async fn empty_queries_skip_the_network() {
        let client = NodeClient::new("http://127.0.0.1:1", NetworkId::Regtest).unwrap();
        assert!(client.entries_by_heights(&[]).await.unwrap().is_empty());
        assert!(client.transactions_by_addresses(&[]).await.unwrap().is_empty());
    }
}
