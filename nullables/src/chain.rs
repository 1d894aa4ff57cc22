//! Nullable chain: an in-memory full node for testing.
//!
//! Blocks are mined on demand from whatever transactions a test supplies.
//! The node keeps its own UTXO set, so coin lookups and the input-coin
//! snapshots on transaction records reflect what was actually mined.

use hnsw_chain_client::{ChainClient, ChainError, ChainInfo};
use hnsw_crypto::{blake2b_256, blake2b_256_multi, hash_transaction};
use hnsw_types::{
    Address, Amount, BlockHash, ChainEntry, Coin, Outpoint, Output, Transaction,
    TransactionRecord, TxHash,
};
use num_bigint::BigUint;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

const GENESIS_TIME: u64 = 1_580_745_078;
const BLOCK_INTERVAL: u64 = 600;

struct Inner {
    /// `entries[h - 1]` is the entry at height `h`.
    entries: Vec<ChainEntry>,
    records: Vec<TransactionRecord>,
    utxos: HashMap<Outpoint, Coin>,
    broadcasts: Vec<Transaction>,
    /// Broadcast hash → mempool poll count at broadcast time.
    pending: Vec<(TxHash, u32)>,
    mempool_polls: u32,
    /// Address count of each history query, in call order.
    address_queries: Vec<usize>,
    /// Polls a broadcast stays invisible for. `None` never relays.
    relay_after: Option<u32>,
    fail_entries_at: Option<u32>,
    yield_on_fetch: bool,
    fee_rate: Amount,
    nonce: u32,
}

/// An in-memory [`ChainClient`].
pub struct NullChain {
    inner: Mutex<Inner>,
}

impl NullChain {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                records: Vec::new(),
                utxos: HashMap::new(),
                broadcasts: Vec::new(),
                pending: Vec::new(),
                mempool_polls: 0,
                address_queries: Vec::new(),
                relay_after: Some(0),
                fail_entries_at: None,
                yield_on_fetch: false,
                fee_rate: Amount::new(1_000),
                nonce: 0,
            }),
        }
    }

    pub fn height(&self) -> u32 {
        self.inner.lock().unwrap().entries.len() as u32
    }

    pub fn entry(&self, height: u32) -> Option<ChainEntry> {
        let inner = self.inner.lock().unwrap();
        height
            .checked_sub(1)
            .and_then(|i| inner.entries.get(i as usize).cloned())
    }

    /// Mine a block containing `txs`, in order.
    pub fn mine_block(&self, txs: Vec<Transaction>) -> ChainEntry {
        let mut inner = self.inner.lock().unwrap();
        let height = inner.entries.len() as u32 + 1;
        let (prev_block, prev_work) = inner
            .entries
            .last()
            .map(|e| (e.hash, e.chainwork.clone()))
            .unwrap_or((BlockHash::ZERO, BigUint::default()));

        let hashes: Vec<TxHash> = txs.iter().map(hash_transaction).collect();
        let mut leaves = Vec::with_capacity(hashes.len() * 32);
        for hash in &hashes {
            leaves.extend_from_slice(hash.as_bytes());
        }
        let merkle_root = blake2b_256(&leaves);
        let hash = BlockHash::new(blake2b_256_multi(&[
            prev_block.as_bytes(),
            &height.to_le_bytes(),
            &merkle_root,
        ]));

        let entry = ChainEntry {
            hash,
            height,
            version: 0,
            prev_block,
            merkle_root,
            witness_root: merkle_root,
            tree_root: [0; 32],
            reserved_root: [0; 32],
            time: GENESIS_TIME + height as u64 * BLOCK_INTERVAL,
            bits: 0x207f_ffff,
            nonce: height,
            extra_nonce: vec![0; 24],
            mask: [0; 32],
            chainwork: prev_work + BigUint::from(1u64 << 32),
        };

        for (index, (tx, tx_hash)) in txs.into_iter().zip(hashes).enumerate() {
            let input_coins = tx
                .inputs
                .iter()
                .map(|input| inner.utxos.remove(&input.prevout))
                .collect();
            for (i, output) in tx.outputs.iter().enumerate() {
                let outpoint = Outpoint::new(tx_hash, i as u32);
                inner
                    .utxos
                    .insert(outpoint, Coin::from_output(outpoint, output, Some(height)));
            }
            inner.pending.retain(|(h, _)| *h != tx_hash);
            inner.records.push(TransactionRecord {
                tx,
                height: Some(height),
                index: index as u32,
                block_hash: Some(hash),
                input_coins,
            });
        }
        inner.entries.push(entry.clone());
        entry
    }

    pub fn mine_empty(&self, count: u32) {
        for _ in 0..count {
            self.mine_block(Vec::new());
        }
    }

    /// A funding transaction with no inputs paying `value` to `address`.
    pub fn payment(&self, address: Address, value: Amount) -> Transaction {
        let mut inner = self.inner.lock().unwrap();
        inner.nonce += 1;
        let mut tx = Transaction::new();
        tx.locktime = inner.nonce;
        tx.outputs.push(Output::payment(value, address));
        tx
    }

    /// Mine a block paying `value` to `address` and return the new coin.
    pub fn fund(&self, address: Address, value: Amount) -> Coin {
        let tx = self.payment(address, value);
        let hash = hash_transaction(&tx);
        let entry = self.mine_block(vec![tx.clone()]);
        Coin::from_tx(&tx, hash, 0, Some(entry.height))
            .unwrap_or_else(|| unreachable!("payment has one output"))
    }

    /// Mine every broadcast transaction not yet in a block.
    pub fn mine_broadcasts(&self) -> ChainEntry {
        let txs = {
            let inner = self.inner.lock().unwrap();
            let pending: HashSet<TxHash> = inner.pending.iter().map(|(h, _)| *h).collect();
            inner
                .broadcasts
                .iter()
                .filter(|tx| pending.contains(&hash_transaction(tx)))
                .cloned()
                .collect()
        };
        self.mine_block(txs)
    }

    /// Place an existing coin in the node's UTXO set without mining.
    pub fn insert_coin(&self, coin: Coin) {
        self.inner.lock().unwrap().utxos.insert(coin.outpoint, coin);
    }

    pub fn broadcasts(&self) -> Vec<Transaction> {
        self.inner.lock().unwrap().broadcasts.clone()
    }

    /// Broadcasts stay out of the mempool for `polls` mempool queries.
    pub fn relay_after(&self, polls: u32) {
        self.inner.lock().unwrap().relay_after = Some(polls);
    }

    pub fn never_relay(&self) {
        self.inner.lock().unwrap().relay_after = None;
    }

    pub fn mempool_polls(&self) -> u32 {
        self.inner.lock().unwrap().mempool_polls
    }

    pub fn address_queries(&self) -> Vec<usize> {
        self.inner.lock().unwrap().address_queries.clone()
    }

    /// Fail the next entry fetch that includes `height`.
    pub fn fail_entries_at(&self, height: u32) {
        self.inner.lock().unwrap().fail_entries_at = Some(height);
    }

    /// Make every entry fetch suspend once, so concurrent tasks interleave.
    pub fn yield_on_fetch(&self, enabled: bool) {
        self.inner.lock().unwrap().yield_on_fetch = enabled;
    }

    pub fn set_fee_rate(&self, rate: Amount) {
        self.inner.lock().unwrap().fee_rate = rate;
    }
}

impl Default for NullChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainClient for NullChain {
    async fn chain_info(&self) -> Result<ChainInfo, ChainError> {
        let inner = self.inner.lock().unwrap();
        Ok(ChainInfo {
            height: inner.entries.len() as u32,
            tip_hash: inner
                .entries
                .last()
                .map(|e| e.hash)
                .unwrap_or(BlockHash::ZERO),
        })
    }

    async fn fee_estimate(&self) -> Result<Amount, ChainError> {
        Ok(self.inner.lock().unwrap().fee_rate)
    }

    async fn entries_by_heights(&self, heights: &[u32]) -> Result<Vec<ChainEntry>, ChainError> {
        let suspend = self.inner.lock().unwrap().yield_on_fetch;
        if suspend {
            tokio::task::yield_now().await;
        }
        let mut inner = self.inner.lock().unwrap();
        if let Some(fail) = inner.fail_entries_at {
            if heights.contains(&fail) {
                inner.fail_entries_at = None;
                return Err(ChainError::Request(format!(
                    "connection reset fetching height {fail}"
                )));
            }
        }
        let mut entries: Vec<ChainEntry> = heights
            .iter()
            .filter_map(|&h| h.checked_sub(1))
            .filter_map(|i| inner.entries.get(i as usize).cloned())
            .collect();
        entries.sort_by_key(|e| e.height);
        Ok(entries)
    }

    async fn transactions_by_addresses(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<TransactionRecord>, ChainError> {
        let wanted: HashSet<&Address> = addresses.iter().collect();
        let mut inner = self.inner.lock().unwrap();
        inner.address_queries.push(addresses.len());
        Ok(inner
            .records
            .iter()
            .filter(|record| {
                record.tx.outputs.iter().any(|o| wanted.contains(&o.address))
                    || record
                        .input_coins
                        .iter()
                        .flatten()
                        .any(|c| wanted.contains(&c.address))
            })
            .cloned()
            .collect())
    }

    async fn coin(&self, outpoint: &Outpoint) -> Result<Option<Coin>, ChainError> {
        Ok(self.inner.lock().unwrap().utxos.get(outpoint).cloned())
    }

    async fn raw_mempool(&self) -> Result<HashSet<TxHash>, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        inner.mempool_polls += 1;
        let polls = inner.mempool_polls;
        let Some(delay) = inner.relay_after else {
            return Ok(HashSet::new());
        };
        Ok(inner
            .pending
            .iter()
            .filter(|(_, at)| polls - at > delay)
            .map(|(hash, _)| *hash)
            .collect())
    }

    async fn broadcast(&self, tx: &Transaction) -> Result<(), ChainError> {
        let mut inner = self.inner.lock().unwrap();
        let polls = inner.mempool_polls;
        inner.pending.push((hash_transaction(tx), polls));
        inner.broadcasts.push(tx.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mined_blocks_extend_the_tip() {
        let chain = NullChain::new();
        chain.mine_empty(3);
        let info = chain.chain_info().await.unwrap();
        assert_eq!(info.height, 3);
        let entries = chain.entries_by_heights(&[3, 1, 2, 9]).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[1].extends(&entries[0]));
        assert!(entries[2].chainwork > entries[1].chainwork);
        assert_eq!(info.tip_hash, entries[2].hash);
    }

    #[tokio::test]
    async fn spent_coins_leave_the_utxo_set() {
        let chain = NullChain::new();
        let address = Address::new(0, [1; 20]);
        let coin = chain.fund(address, Amount::new(50));
        assert_eq!(chain.coin(&coin.outpoint).await.unwrap(), Some(coin.clone()));

        let mut spend = Transaction::new();
        spend.add_coin(&coin);
        chain.mine_block(vec![spend]);
        assert_eq!(chain.coin(&coin.outpoint).await.unwrap(), None);

        let records = chain.transactions_by_addresses(&[address]).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].input_coins, vec![Some(coin)]);
    }

    #[tokio::test]
    async fn scripted_relay_delay() {
        let chain = NullChain::new();
        chain.relay_after(2);
        let tx = chain.payment(Address::new(0, [1; 20]), Amount::new(1));
        chain.broadcast(&tx).await.unwrap();
        assert!(chain.raw_mempool().await.unwrap().is_empty());
        assert!(chain.raw_mempool().await.unwrap().is_empty());
        assert!(chain
            .raw_mempool()
            .await
            .unwrap()
            .contains(&hash_transaction(&tx)));
    }

    #[tokio::test]
    async fn scripted_fetch_failure_fires_once() {
        let chain = NullChain::new();
        chain.mine_empty(2);
        chain.fail_entries_at(2);
        assert!(chain.entries_by_heights(&[1, 2]).await.is_err());
        assert_eq!(chain.entries_by_heights(&[1, 2]).await.unwrap().len(), 2);
    }
}
