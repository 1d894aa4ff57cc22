//! The chain query trait.

use hnsw_types::{
    Address, Amount, BlockHash, ChainEntry, Coin, Outpoint, Transaction, TransactionRecord, TxHash,
};
use std::collections::HashSet;
use std::future::Future;

use crate::ChainError;

/// Summary of the node's current canonical tip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainInfo {
    pub height: u32,
    pub tip_hash: BlockHash,
}

/// Queries the wallet makes against the full node.
pub trait ChainClient: Send + Sync {
    fn chain_info(&self) -> impl Future<Output = Result<ChainInfo, ChainError>> + Send;

    /// Fee rate in base units per 1000 bytes.
    fn fee_estimate(&self) -> impl Future<Output = Result<Amount, ChainError>> + Send;

    /// Entries for the requested heights, ascending. Heights above the tip are omitted.
    fn entries_by_heights(
        &self,
        heights: &[u32],
    ) -> impl Future<Output = Result<Vec<ChainEntry>, ChainError>> + Send;

    /// Every confirmed or pending transaction touching any of `addresses`.
    fn transactions_by_addresses(
        &self,
        addresses: &[Address],
    ) -> impl Future<Output = Result<Vec<TransactionRecord>, ChainError>> + Send;

    /// The unspent output at `outpoint`, `None` if spent or unknown.
    fn coin(
        &self,
        outpoint: &Outpoint,
    ) -> impl Future<Output = Result<Option<Coin>, ChainError>> + Send;

    fn raw_mempool(&self) -> impl Future<Output = Result<HashSet<TxHash>, ChainError>> + Send;

    fn broadcast(&self, tx: &Transaction) -> impl Future<Output = Result<(), ChainError>> + Send;
}
