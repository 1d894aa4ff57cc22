//! The wallet state store trait.

use hnsw_types::{
    Address, Amount, BlockHash, ChainEntry, Coin, KeyPair, NameState, Outpoint, Transaction,
    TransactionRecord,
};

use crate::funding::{fund, FundingOptions};
use crate::StoreError;

/// Wallet-local UTXO and name state, driven by the resync engine.
///
/// Implementations hold their own interior locking; every method takes
/// `&self` so progress sampling can read the tip while a rescan writes.
pub trait WalletStore: Send + Sync {
    /// Height of the last block applied to the wallet.
    fn tip_height(&self) -> Result<u32, StoreError>;

    /// Undo every block above `height`, resurrecting coins they spent.
    fn rollback_to(&self, height: u32) -> Result<(), StoreError>;

    /// Apply one block's wallet-relevant transactions.
    ///
    /// Re-applying the block already recorded at `entry.height` is a no-op.
    fn apply_block(
        &self,
        entry: &ChainEntry,
        txs: &[TransactionRecord],
    ) -> Result<(), StoreError>;

    /// Flag read by the backend's own listeners while a rescan is writing.
    fn set_rescan_guard(&self, active: bool);

    /// Receive and change addresses for derivation indices `from..from + count`.
    fn wallet_addresses(&self, from: u32, count: u32) -> Result<Vec<Address>, StoreError>;

    fn name_state(&self, name: &str) -> Result<Option<NameState>, StoreError>;

    fn coin(&self, outpoint: &Outpoint) -> Result<Option<Coin>, StoreError>;

    /// Hash of the block names renewed now must commit to.
    fn renewal_block(&self) -> Result<BlockHash, StoreError>;

    /// Fee rate in base units per 1000 bytes.
    fn estimate_fee(&self) -> Result<Amount, StoreError>;

    /// Unlocked, plain-value coins available for funding.
    fn spendable_coins(&self) -> Result<Vec<Coin>, StoreError>;

    fn change_address(&self) -> Result<Address, StoreError>;

    /// Add inputs and change until `tx` pays for its outputs and fee.
    ///
    /// Existing inputs are rebuilt from `coins` and lose their witnesses.
    fn fund_transaction(
        &self,
        tx: &mut Transaction,
        coins: &[Coin],
        options: &FundingOptions,
    ) -> Result<(), StoreError> {
        fund(tx, coins, options)
    }

    /// Keys for every input of `tx` that spends a wallet-owned coin, in input order.
    fn derive_signing_keys(&self, tx: &Transaction) -> Result<Vec<KeyPair>, StoreError>;

    /// Wallets backed by an external signer hold no private keys.
    fn is_watch_only(&self) -> bool;

    /// Reserve a coin so coin selection skips it. Fails if already reserved.
    fn lock_coin(&self, outpoint: &Outpoint) -> Result<(), StoreError>;

    fn unlock_coin(&self, outpoint: &Outpoint);
}
