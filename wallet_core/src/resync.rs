//! The chain resync engine.
//!
//! Drives the wallet store up to the node's tip in strictly ascending height
//! order. Every store mutation happens under the engine's [`RescanLock`], so
//! a rollback never interleaves with a live block apply. Resume points are
//! always re-read from the store's tip, never from an in-memory counter.

use hnsw_chain_client::{ChainClient, ChainError};
use hnsw_store::WalletStore;
use hnsw_types::{Address, ChainEntry, TransactionRecord};
use hnsw_utils::{format_duration, Sleeper, StatsCounter};
use std::collections::{BTreeMap, HashSet};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::{EventBus, ProgressTracker, SyncEvent};
use crate::guard::RescanLock;
use crate::{WalletConfig, WalletError};

pub const STAT_BLOCKS_APPLIED: &str = "blocks_applied";
pub const STAT_TXS_APPLIED: &str = "txs_applied";
pub const STAT_ROLLBACKS: &str = "rollbacks";

/// How a `check_status` supervision ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The wallet was already at the chain tip; nothing was emitted.
    AlreadySynced,
    Converged,
    /// The connection was torn down before convergence.
    Cancelled,
}

pub struct ResyncEngine<S, C, T> {
    store: Arc<S>,
    chain: Arc<C>,
    sleeper: T,
    config: WalletConfig,
    events: EventBus,
    lock: RescanLock,
    stats: StatsCounter,
}

/// Confirmed records at heights `from` and above, grouped by each record's
/// own height and ordered by block position.
fn group_by_height(records: Vec<TransactionRecord>, from: u32) -> BTreeMap<u32, Vec<TransactionRecord>> {
    let mut grouped: BTreeMap<u32, Vec<TransactionRecord>> = BTreeMap::new();
    for record in records {
        let Some(height) = record.height else {
            continue;
        };
        if height >= from {
            grouped.entry(height).or_default().push(record);
        }
    }
    for txs in grouped.values_mut() {
        txs.sort_by_key(|r| r.index);
    }
    grouped
}

/// Drop records the node attributes to a different block than `entry`.
fn records_for(entry: &ChainEntry, records: Vec<TransactionRecord>) -> Vec<TransactionRecord> {
    records
        .into_iter()
        .filter(|r| r.block_hash.map_or(true, |hash| hash == entry.hash))
        .collect()
}

fn missing_entry(height: u32) -> WalletError {
    WalletError::Chain(ChainError::InvalidResponse(format!(
        "node returned no entry for height {height}"
    )))
}

impl<S, C, T> ResyncEngine<S, C, T>
where
    S: WalletStore,
    C: ChainClient,
    T: Sleeper,
{
    /// Fails with [`WalletError::Config`] if `config` does not validate.
    pub fn new(
        store: Arc<S>,
        chain: Arc<C>,
        sleeper: T,
        config: WalletConfig,
        events: EventBus,
    ) -> Result<Self, WalletError> {
        config.validate()?;
        Ok(Self {
            store,
            chain,
            sleeper,
            config,
            events,
            lock: RescanLock::new(),
            stats: StatsCounter::new(&[STAT_BLOCKS_APPLIED, STAT_TXS_APPLIED, STAT_ROLLBACKS]),
        })
    }

    pub fn stats(&self) -> &StatsCounter {
        &self.stats
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    fn emit(&self, event: SyncEvent) {
        self.events.emit(&event);
    }

    fn apply_locked(&self, entry: &ChainEntry, txs: &[TransactionRecord]) -> Result<(), WalletError> {
        self.store.apply_block(entry, txs)?;
        self.stats.increment(STAT_BLOCKS_APPLIED);
        self.stats.add(STAT_TXS_APPLIED, txs.len() as u64);
        debug!(height = entry.height, hash = %entry.hash, txs = txs.len(), "applied block");
        Ok(())
    }

    fn rollback_locked(&self, height: u32) -> Result<(), WalletError> {
        self.store.rollback_to(height)?;
        self.stats.increment(STAT_ROLLBACKS);
        info!(height, "wallet rolled back");
        Ok(())
    }

    /// Apply one block's transactions. Waits for any running rescan.
    pub async fn apply_block(
        &self,
        entry: &ChainEntry,
        txs: &[TransactionRecord],
    ) -> Result<(), WalletError> {
        let _guard = self.lock.acquire(&*self.store).await;
        self.apply_locked(entry, txs)
    }

    /// Live block hook: apply the block, then publish the new tip and fee rate.
    pub async fn on_new_block(
        &self,
        entry: &ChainEntry,
        txs: &[TransactionRecord],
    ) -> Result<(), WalletError> {
        self.apply_block(entry, txs).await?;
        let fee_rate = self.chain.fee_estimate().await?;
        self.emit(SyncEvent::ChainTip {
            height: entry.height,
            hash: entry.hash,
            fee_rate,
        });
        Ok(())
    }

    /// Supervise convergence driven elsewhere, re-sampling both heights
    /// every status tick until they meet.
    pub async fn check_status(
        &self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<PollOutcome, WalletError> {
        let wallet = self.store.tip_height()?;
        let chain = self.chain.chain_info().await?.height;
        if wallet >= chain {
            return Ok(PollOutcome::AlreadySynced);
        }

        info!(wallet, chain, "wallet behind chain, polling for convergence");
        let session = self.events.start_session();
        let mut tracker = ProgressTracker::new();
        self.emit(SyncEvent::Progress {
            percent: tracker.observe(wallet, chain),
        });

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("connection closed, status polling stopped");
                    return Ok(PollOutcome::Cancelled);
                }
                _ = self.sleeper.sleep(self.config.status_poll_interval()) => {}
            }

            let wallet = self.store.tip_height()?;
            let chain = self.chain.chain_info().await?.height;
            if wallet >= chain {
                info!(height = wallet, "wallet synced");
                drop(session);
                self.emit(SyncEvent::Progress { percent: 100 });
                return Ok(PollOutcome::Converged);
            }
            self.emit(SyncEvent::Progress {
                percent: tracker.observe(wallet, chain),
            });
        }
    }

    /// Roll the wallet back to `from` and replay the chain up to its tip.
    ///
    /// Fails with [`WalletError::RescanInProgress`] if another rescan holds
    /// the lock. Every call rolls back to `from` first, so after a fetch or
    /// apply failure pass the store's current tip to resume without
    /// replaying the blocks already applied.
    pub async fn full_rescan(
        &self,
        from: u32,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), WalletError> {
        let _guard = self.lock.try_acquire(&*self.store)?;
        let started = Instant::now();
        info!(from, "starting full rescan");
        let session = self.events.start_session();
        self.emit(SyncEvent::Progress { percent: 0 });

        self.rollback_locked(from)?;
        let chain_height = AtomicU32::new(self.chain.chain_info().await?.height);

        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                info!("connection closed, rescan cancelled");
                return Err(WalletError::Cancelled);
            }
            result = self.catch_up(&chain_height) => result?,
            never = self.sample_progress(&chain_height) => match never {},
        }

        self.emit(SyncEvent::Progress { percent: 100 });
        drop(session);
        info!(
            tip = self.store.tip_height()?,
            blocks = self.stats.get(STAT_BLOCKS_APPLIED),
            txs = self.stats.get(STAT_TXS_APPLIED),
            elapsed = %format_duration(started.elapsed()),
            "full rescan complete"
        );
        Ok(())
    }

    /// Wallet addresses for derivation indices `0..limit`, one query batch
    /// per `address_batch` indices.
    fn address_batches(&self, limit: u32) -> Result<Vec<Vec<Address>>, WalletError> {
        let batch = self.config.address_batch;
        let mut batches = Vec::new();
        let mut start = 0;
        while start < limit {
            let count = batch.min(limit - start);
            batches.push(self.store.wallet_addresses(start, count)?);
            start += count;
        }
        Ok(batches)
    }

    async fn wallet_history(
        &self,
        batches: &[Vec<Address>],
    ) -> Result<Vec<TransactionRecord>, WalletError> {
        let mut records = Vec::new();
        for addresses in batches {
            records.extend(self.chain.transactions_by_addresses(addresses).await?);
        }
        // The same transaction can touch addresses in several batches.
        let mut seen = HashSet::new();
        records.retain(|r| seen.insert(hnsw_crypto::hash_transaction(&r.tx)));
        Ok(records)
    }

    async fn catch_up(&self, chain_height: &AtomicU32) -> Result<(), WalletError> {
        let batches = self.address_batches(self.config.address_depth)?;
        // History is complete up to the chain height it was fetched at.
        let mut fetched_at: Option<u32> = None;
        let mut grouped = BTreeMap::new();
        loop {
            let chain = self.chain.chain_info().await?.height;
            chain_height.store(chain, Ordering::Relaxed);
            let tip = self.store.tip_height()?;
            if tip >= chain {
                return Ok(());
            }

            let end = chain.min(tip.saturating_add(self.config.rescan_batch_size));
            if fetched_at.map_or(true, |at| end > at) {
                let records = self.wallet_history(&batches).await?;
                grouped = group_by_height(records, tip + 1);
                fetched_at = Some(chain);
                debug!(heights = grouped.len(), at = chain, "fetched wallet history");
            }
            let heights: Vec<u32> = (tip + 1..=end).collect();
            let entries = self.chain.entries_by_heights(&heights).await?;

            let mut entries = entries.into_iter();
            for height in heights {
                let entry = entries
                    .next()
                    .filter(|e| e.height == height)
                    .ok_or_else(|| missing_entry(height))?;
                let txs = records_for(&entry, grouped.remove(&height).unwrap_or_default());
                self.apply_locked(&entry, &txs)?;
            }
        }
    }

    async fn sample_progress(&self, chain_height: &AtomicU32) -> Infallible {
        let mut tracker = ProgressTracker::resetting();
        loop {
            self.sleeper.sleep(self.config.status_poll_interval()).await;
            let wallet = match self.store.tip_height() {
                Ok(height) => height,
                Err(e) => {
                    warn!(error = %e, "progress sample failed");
                    continue;
                }
            };
            let percent = tracker.observe(wallet, chain_height.load(Ordering::Relaxed));
            self.emit(SyncEvent::Progress { percent });
        }
    }

    /// Bulk rescan kept as a reference algorithm: pre-fetch every wallet
    /// transaction, roll back, then walk committed heights in batches.
    pub async fn legacy_bulk_rescan(&self, from: u32) -> Result<(), WalletError> {
        let _guard = self.lock.try_acquire(&*self.store)?;
        let started = Instant::now();
        info!(from, "starting legacy bulk rescan");
        let session = self.events.start_session();

        let batches = self.address_batches(self.config.legacy_address_limit)?;
        let records = self.wallet_history(&batches).await?;
        let mut grouped = group_by_height(records, from.saturating_add(1));
        debug!(heights = grouped.len(), "grouped wallet transactions");

        self.rollback_locked(from)?;

        let chain = self.chain.chain_info().await?.height;
        let block_batch = self.config.rescan_batch_size;
        let every = self.config.legacy_progress_every;
        let mut tracker = ProgressTracker::new();
        let mut next = from.saturating_add(1);
        while next <= chain {
            let end = chain.min(next.saturating_add(block_batch - 1));
            let heights: Vec<u32> = (next..=end).collect();
            let entries = self.chain.entries_by_heights(&heights).await?;
            let short = entries.len() < heights.len();

            for entry in entries {
                if entry.height != next {
                    return Err(missing_entry(next));
                }
                let txs = records_for(&entry, grouped.remove(&entry.height).unwrap_or_default());
                self.apply_locked(&entry, &txs)?;
                if (entry.height - from) % every == 0 {
                    self.emit(SyncEvent::Progress {
                        percent: tracker.observe(entry.height, chain),
                    });
                }
                next += 1;
            }
            if short {
                break;
            }
        }

        self.emit(SyncEvent::Progress { percent: 100 });
        drop(session);
        info!(
            tip = self.store.tip_height()?,
            blocks = self.stats.get(STAT_BLOCKS_APPLIED),
            elapsed = %format_duration(started.elapsed()),
            "legacy bulk rescan complete"
        );
        Ok(())
    }
}
