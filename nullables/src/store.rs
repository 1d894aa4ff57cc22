//! Nullable wallet store: thread-safe in-memory wallet state for testing.
//!
//! Keeps one snapshot of the wallet state per applied height so rollback
//! restores exactly what an earlier apply left behind. Keys derive from a
//! 32-byte seed along a receive and a change branch; coins paid to the
//! first `DEFAULT_LOOKAHEAD` addresses of either branch are the wallet's.

use hnsw_crypto::{
    address_from_public_key, blake2b_256_multi, hash_name, hash_transaction, keypair_from_seed,
};
use hnsw_store::{StoreError, WalletStore};
use hnsw_types::{
    Address, Amount, BlockHash, ChainEntry, Coin, CovenantType, KeyPair, NameHash, NameState,
    Outpoint, Output, Transaction, TransactionRecord,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

const RECEIVE_BRANCH: u32 = 0;
const CHANGE_BRANCH: u32 = 1;

/// Derivation indices per branch treated as owned.
pub const DEFAULT_LOOKAHEAD: u32 = 20;

/// Fee rate reported until a test sets one.
pub const DEFAULT_FEE_RATE: Amount = Amount::new(1_000);

/// Wallet content compared by determinism tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalletState {
    /// Block hash applied at each height.
    pub blocks: BTreeMap<u32, BlockHash>,
    pub coins: BTreeMap<Outpoint, Coin>,
    pub names: BTreeMap<NameHash, NameState>,
}

impl WalletState {
    pub fn tip_height(&self) -> u32 {
        self.blocks.keys().next_back().copied().unwrap_or(0)
    }
}

/// One call to `apply_block`, as observed by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppliedBlock {
    pub height: u32,
    pub hash: BlockHash,
    /// Whether the rescan guard was set during the call.
    pub guarded: bool,
}

struct Inner {
    /// `history[h]` is the state after height `h`; the last entry is current.
    history: Vec<WalletState>,
    locked: HashSet<Outpoint>,
    applied: Vec<AppliedBlock>,
    fail_apply_at: Option<u32>,
    fee_rate: Amount,
    renewal_block: Option<BlockHash>,
}

impl Inner {
    fn current(&self) -> &WalletState {
        &self.history[self.history.len() - 1]
    }

    fn tip(&self) -> u32 {
        (self.history.len() - 1) as u32
    }
}

/// An in-memory [`WalletStore`].
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullWalletStore {
    seed: [u8; 32],
    /// Owned address → (branch, index).
    owned: HashMap<Address, (u32, u32)>,
    /// Derived (receive, change) addresses by index, grown on demand.
    derived: Mutex<Vec<(Address, Address)>>,
    inner: Mutex<Inner>,
    rescan_guard: AtomicBool,
    watch_only: AtomicBool,
}

fn child_seed(seed: &[u8; 32], branch: u32, index: u32) -> [u8; 32] {
    blake2b_256_multi(&[seed.as_slice(), &branch.to_le_bytes(), &index.to_le_bytes()])
}

fn derive_keypair(seed: &[u8; 32], branch: u32, index: u32) -> KeyPair {
    keypair_from_seed(&child_seed(seed, branch, index))
}

fn derive_address(seed: &[u8; 32], branch: u32, index: u32) -> Address {
    address_from_public_key(&derive_keypair(seed, branch, index).public)
}

impl NullWalletStore {
    pub fn new(seed: [u8; 32]) -> Self {
        let mut owned = HashMap::new();
        let mut derived = Vec::new();
        for index in 0..DEFAULT_LOOKAHEAD {
            let receive = derive_address(&seed, RECEIVE_BRANCH, index);
            let change = derive_address(&seed, CHANGE_BRANCH, index);
            owned.insert(receive, (RECEIVE_BRANCH, index));
            owned.insert(change, (CHANGE_BRANCH, index));
            derived.push((receive, change));
        }
        Self {
            seed,
            owned,
            derived: Mutex::new(derived),
            inner: Mutex::new(Inner {
                history: vec![WalletState::default()],
                locked: HashSet::new(),
                applied: Vec::new(),
                fail_apply_at: None,
                fee_rate: DEFAULT_FEE_RATE,
                renewal_block: None,
            }),
            rescan_guard: AtomicBool::new(false),
            watch_only: AtomicBool::new(false),
        }
    }

    /// Receive address at derivation `index`.
    pub fn receive_address(&self, index: u32) -> Address {
        self.addresses_for(index, 1)[0].0
    }

    pub fn owns(&self, address: &Address) -> bool {
        self.owned.contains_key(address)
    }

    /// Current wallet content.
    pub fn snapshot(&self) -> WalletState {
        self.inner.lock().unwrap().current().clone()
    }

    /// Record a coin as pre-existing wallet state. It survives any rollback.
    pub fn insert_coin(&self, coin: Coin) {
        let mut inner = self.inner.lock().unwrap();
        for state in &mut inner.history {
            state.coins.insert(coin.outpoint, coin.clone());
        }
    }

    /// Record a name as pre-existing wallet state. It survives any rollback.
    pub fn insert_name(&self, name: NameState) {
        let mut inner = self.inner.lock().unwrap();
        for state in &mut inner.history {
            state.names.insert(name.name_hash, name.clone());
        }
    }

    pub fn set_watch_only(&self, watch_only: bool) {
        self.watch_only.store(watch_only, Ordering::SeqCst);
    }

    pub fn set_fee_rate(&self, rate: Amount) {
        self.inner.lock().unwrap().fee_rate = rate;
    }

    pub fn set_renewal_block(&self, hash: BlockHash) {
        self.inner.lock().unwrap().renewal_block = Some(hash);
    }

    /// Make the next `apply_block` at `height` fail once with a backend error.
    pub fn fail_apply_at(&self, height: u32) {
        self.inner.lock().unwrap().fail_apply_at = Some(height);
    }

    /// Every `apply_block` call so far, including no-op re-applies.
    pub fn applied_blocks(&self) -> Vec<AppliedBlock> {
        self.inner.lock().unwrap().applied.clone()
    }

    pub fn is_locked(&self, outpoint: &Outpoint) -> bool {
        self.inner.lock().unwrap().locked.contains(outpoint)
    }

    pub fn rescan_guard_active(&self) -> bool {
        self.rescan_guard.load(Ordering::SeqCst)
    }

    fn addresses_for(&self, from: u32, count: u32) -> Vec<(Address, Address)> {
        let end = from.saturating_add(count) as usize;
        let mut derived = self.derived.lock().unwrap();
        while derived.len() < end {
            let index = derived.len() as u32;
            derived.push((
                derive_address(&self.seed, RECEIVE_BRANCH, index),
                derive_address(&self.seed, CHANGE_BRANCH, index),
            ));
        }
        derived[from as usize..end].to_vec()
    }

    fn apply_transaction(&self, state: &mut WalletState, tx: &Transaction, height: u32) {
        let hash = hash_transaction(tx);
        for input in &tx.inputs {
            state.coins.remove(&input.prevout);
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            let outpoint = Outpoint::new(hash, index as u32);
            let ours = self.owns(&output.address);
            Self::apply_name_covenant(state, output, outpoint, ours, height);
            if ours {
                state
                    .coins
                    .insert(outpoint, Coin::from_output(outpoint, output, Some(height)));
            }
        }
    }

    fn apply_name_covenant(
        state: &mut WalletState,
        output: &Output,
        outpoint: Outpoint,
        ours: bool,
        height: u32,
    ) {
        let covenant = &output.covenant;
        let Some(name_hash) = covenant.name_hash() else {
            return;
        };
        match covenant.kind {
            CovenantType::Finalize if ours => {
                let name = covenant
                    .item(2)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_default();
                let flags = covenant.read_u8(3).unwrap_or(0);
                state.names.insert(
                    name_hash,
                    NameState {
                        name,
                        name_hash,
                        height: covenant.read_u32(1).unwrap_or(height),
                        renewal: height,
                        owner: outpoint,
                        weak: flags & 1 != 0,
                        claimed: covenant.read_u32(4).unwrap_or(0),
                        renewals: covenant.read_u32(5).unwrap_or(0) + 1,
                        transfer: 0,
                    },
                );
            }
            CovenantType::Finalize | CovenantType::Revoke => {
                state.names.remove(&name_hash);
            }
            kind if ours => {
                if let Some(ns) = state.names.get_mut(&name_hash) {
                    ns.owner = outpoint;
                    match kind {
                        CovenantType::Transfer => ns.transfer = height,
                        CovenantType::Renew => {
                            ns.renewal = height;
                            ns.renewals += 1;
                        }
                        CovenantType::Register | CovenantType::Update => ns.renewal = height,
                        _ => {}
                    }
                }
            }
            _ => {
                state.names.remove(&name_hash);
            }
        }
    }
}

impl WalletStore for NullWalletStore {
    fn tip_height(&self) -> Result<u32, StoreError> {
        Ok(self.inner.lock().unwrap().tip())
    }

    fn rollback_to(&self, height: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.history.truncate(height as usize + 1);
        Ok(())
    }

    fn apply_block(&self, entry: &ChainEntry, txs: &[TransactionRecord]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.applied.push(AppliedBlock {
            height: entry.height,
            hash: entry.hash,
            guarded: self.rescan_guard_active(),
        });
        if inner.fail_apply_at == Some(entry.height) {
            inner.fail_apply_at = None;
            return Err(StoreError::Backend(format!(
                "scripted failure at height {}",
                entry.height
            )));
        }

        let tip = inner.tip();
        if entry.height <= tip {
            return match inner.current().blocks.get(&entry.height) {
                Some(hash) if *hash == entry.hash => Ok(()),
                _ => Err(StoreError::ConflictingBlock {
                    height: entry.height,
                    hash: entry.hash,
                }),
            };
        }
        if entry.height != tip + 1 {
            return Err(StoreError::NonContiguousBlock {
                tip,
                got: entry.height,
            });
        }

        let mut next = inner.current().clone();
        next.blocks.insert(entry.height, entry.hash);
        for record in txs {
            self.apply_transaction(&mut next, &record.tx, entry.height);
        }
        inner.history.push(next);
        Ok(())
    }

    fn set_rescan_guard(&self, active: bool) {
        self.rescan_guard.store(active, Ordering::SeqCst);
    }

    fn wallet_addresses(&self, from: u32, count: u32) -> Result<Vec<Address>, StoreError> {
        Ok(self
            .addresses_for(from, count)
            .into_iter()
            .flat_map(|(receive, change)| [receive, change])
            .collect())
    }

    fn name_state(&self, name: &str) -> Result<Option<NameState>, StoreError> {
        let name_hash = hash_name(name);
        Ok(self
            .inner
            .lock()
            .unwrap()
            .current()
            .names
            .get(&name_hash)
            .cloned())
    }

    fn coin(&self, outpoint: &Outpoint) -> Result<Option<Coin>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .current()
            .coins
            .get(outpoint)
            .cloned())
    }

    fn renewal_block(&self) -> Result<BlockHash, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.renewal_block.unwrap_or_else(|| {
            inner
                .current()
                .blocks
                .values()
                .next_back()
                .copied()
                .unwrap_or(BlockHash::ZERO)
        }))
    }

    fn estimate_fee(&self) -> Result<Amount, StoreError> {
        Ok(self.inner.lock().unwrap().fee_rate)
    }

    fn spendable_coins(&self) -> Result<Vec<Coin>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .current()
            .coins
            .values()
            .filter(|c| c.covenant.kind == CovenantType::None)
            .filter(|c| !inner.locked.contains(&c.outpoint))
            .cloned()
            .collect())
    }

    fn change_address(&self) -> Result<Address, StoreError> {
        Ok(self.addresses_for(0, 1)[0].1)
    }

    fn derive_signing_keys(&self, tx: &Transaction) -> Result<Vec<KeyPair>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let coins = &inner.current().coins;
        Ok(tx
            .inputs
            .iter()
            .filter_map(|input| coins.get(&input.prevout))
            .filter_map(|coin| self.owned.get(&coin.address))
            .map(|&(branch, index)| derive_keypair(&self.seed, branch, index))
            .collect())
    }

    fn is_watch_only(&self) -> bool {
        self.watch_only.load(Ordering::SeqCst)
    }

    fn lock_coin(&self, outpoint: &Outpoint) -> Result<(), StoreError> {
        if !self.inner.lock().unwrap().locked.insert(*outpoint) {
            return Err(StoreError::CoinLocked(format!(
                "{}:{}",
                outpoint.hash, outpoint.index
            )));
        }
        Ok(())
    }

    fn unlock_coin(&self, outpoint: &Outpoint) {
        self.inner.lock().unwrap().locked.remove(outpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hnsw_types::{Covenant, TxHash};
    use num_bigint::BigUint;

    fn entry(height: u32, tag: u8) -> ChainEntry {
        ChainEntry {
            hash: BlockHash::new([tag; 32]),
            height,
            version: 0,
            prev_block: BlockHash::ZERO,
            merkle_root: [0; 32],
            witness_root: [0; 32],
            tree_root: [0; 32],
            reserved_root: [0; 32],
            time: 0,
            bits: 0,
            nonce: 0,
            extra_nonce: Vec::new(),
            mask: [0; 32],
            chainwork: BigUint::default(),
        }
    }

    fn payment_to(address: Address, value: u64, nonce: u8) -> TransactionRecord {
        let mut tx = Transaction::new();
        tx.locktime = nonce as u32;
        tx.outputs.push(Output::payment(Amount::new(value), address));
        TransactionRecord {
            tx,
            height: None,
            index: 0,
            block_hash: None,
            input_coins: Vec::new(),
        }
    }

    #[test]
    fn apply_then_reapply_is_a_no_op() {
        let store = NullWalletStore::new([1; 32]);
        let pay = payment_to(store.receive_address(0), 5_000, 1);
        store.apply_block(&entry(1, 1), &[pay.clone()]).unwrap();
        let once = store.snapshot();
        store.apply_block(&entry(1, 1), &[pay]).unwrap();
        assert_eq!(store.snapshot(), once);
        assert_eq!(once.coins.len(), 1);
        assert_eq!(store.applied_blocks().len(), 2);
    }

    #[test]
    fn gaps_and_conflicts_are_rejected() {
        let store = NullWalletStore::new([1; 32]);
        assert!(matches!(
            store.apply_block(&entry(2, 2), &[]),
            Err(StoreError::NonContiguousBlock { tip: 0, got: 2 })
        ));
        store.apply_block(&entry(1, 1), &[]).unwrap();
        assert!(matches!(
            store.apply_block(&entry(1, 9), &[]),
            Err(StoreError::ConflictingBlock { height: 1, .. })
        ));
    }

    #[test]
    fn rollback_resurrects_spent_coins() {
        let store = NullWalletStore::new([1; 32]);
        let pay = payment_to(store.receive_address(0), 5_000, 1);
        let outpoint = Outpoint::new(hash_transaction(&pay.tx), 0);
        store.apply_block(&entry(1, 1), &[pay]).unwrap();

        let mut spend = Transaction::new();
        spend.inputs.push(hnsw_types::Input::from_outpoint(outpoint));
        spend
            .outputs
            .push(Output::payment(Amount::new(4_000), Address::new(0, [9; 20])));
        let spend = TransactionRecord {
            tx: spend,
            height: Some(2),
            index: 0,
            block_hash: None,
            input_coins: Vec::new(),
        };
        store.apply_block(&entry(2, 2), &[spend]).unwrap();
        assert!(store.snapshot().coins.is_empty());

        store.rollback_to(1).unwrap();
        assert_eq!(store.tip_height().unwrap(), 1);
        assert!(store.snapshot().coins.contains_key(&outpoint));
    }

    #[test]
    fn seeded_state_survives_rollback() {
        let store = NullWalletStore::new([1; 32]);
        store.apply_block(&entry(1, 1), &[]).unwrap();
        let coin = Coin::from_output(
            Outpoint::new(TxHash::new([4; 32]), 0),
            &Output::payment(Amount::new(10), store.receive_address(1)),
            Some(1),
        );
        store.insert_coin(coin.clone());
        store.rollback_to(0).unwrap();
        assert_eq!(store.coin(&coin.outpoint).unwrap(), Some(coin));
    }

    #[test]
    fn finalize_to_wallet_creates_name_state() {
        let store = NullWalletStore::new([1; 32]);
        let name_hash = hash_name("example");
        let mut cov = Covenant::new(CovenantType::Finalize);
        cov.push_hash(name_hash.as_bytes())
            .push_u32(3)
            .push(b"example".to_vec())
            .push_u8(1)
            .push_u32(0)
            .push_u32(2)
            .push_hash(&[0; 32]);
        let mut tx = Transaction::new();
        tx.outputs.push(Output {
            value: Amount::ZERO,
            address: store.receive_address(2),
            covenant: cov,
        });
        let record = TransactionRecord {
            tx,
            height: Some(1),
            index: 0,
            block_hash: None,
            input_coins: Vec::new(),
        };
        store.apply_block(&entry(1, 1), &[record]).unwrap();

        let ns = store.name_state("Example").unwrap().unwrap();
        assert_eq!(ns.height, 3);
        assert!(ns.weak);
        assert_eq!(ns.renewals, 3);
        assert_eq!(ns.transfer, 0);
        assert_eq!(store.spendable_coins().unwrap().len(), 0);
    }

    #[test]
    fn locked_coins_are_not_spendable() {
        let store = NullWalletStore::new([1; 32]);
        let coin = Coin::from_output(
            Outpoint::new(TxHash::new([4; 32]), 0),
            &Output::payment(Amount::new(10), store.receive_address(0)),
            Some(1),
        );
        store.insert_coin(coin.clone());
        store.lock_coin(&coin.outpoint).unwrap();
        assert!(store.spendable_coins().unwrap().is_empty());
        assert!(matches!(
            store.lock_coin(&coin.outpoint),
            Err(StoreError::CoinLocked(_))
        ));
        store.unlock_coin(&coin.outpoint);
        assert_eq!(store.spendable_coins().unwrap(), vec![coin]);
    }

    #[test]
    fn wallet_addresses_cover_both_branches() {
        let store = NullWalletStore::new([1; 32]);
        let all = store.wallet_addresses(0, 30).unwrap();
        assert_eq!(all.len(), 60);
        assert_eq!(all[0], store.receive_address(0));
        assert_eq!(all[1], store.change_address().unwrap());
        assert_eq!(store.wallet_addresses(25, 5).unwrap(), all[50..].to_vec());
    }

    #[test]
    fn signing_keys_only_for_owned_inputs() {
        let store = NullWalletStore::new([1; 32]);
        let ours = Coin::from_output(
            Outpoint::new(TxHash::new([4; 32]), 0),
            &Output::payment(Amount::new(10), store.receive_address(3)),
            Some(1),
        );
        store.insert_coin(ours.clone());
        let mut tx = Transaction::new();
        tx.inputs
            .push(hnsw_types::Input::from_outpoint(Outpoint::new(TxHash::new([5; 32]), 0)));
        tx.add_coin(&ours);
        let keys = store.derive_signing_keys(&tx).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(address_from_public_key(&keys[0].public), ours.address);
    }
}
