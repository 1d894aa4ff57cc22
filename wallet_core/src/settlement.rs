//! Two-party name settlement without escrow.
//!
//! The seller spends the name's Transfer coin into a Finalize output for the
//! buyer plus a payment output to themselves, and signs with
//! `SINGLE_REVERSE | ANYONE_CAN_PAY`: input 0 commits to the last output
//! (the payment) and to no other input. The Finalize output at index 0 is
//! pinned by the covenant rule that a Transfer input must be matched by a
//! Finalize to the transfer recipient at the same index. The buyer appends
//! funding inputs and change, moves the payment back to the last position,
//! signs their own inputs and broadcasts.

use hnsw_chain_client::ChainClient;
use hnsw_crypto::{hash_transaction, SigHashType};
use hnsw_store::{CoinView, FundingOptions, StoreError, WalletStore};
use hnsw_types::{
    Address, Amount, CovenantType, Outpoint, Output, Transaction, TxHash,
};
use hnsw_utils::Sleeper;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::covenants::{finalize_covenant, transfer_recipient};
use crate::signing::{sign_transaction, verify_inputs, verify_transaction};
use crate::{WalletConfig, WalletError};

/// Scope of the seller's signature on the name input.
pub const OFFER_SIGHASH: SigHashType = SigHashType::SINGLE_REVERSE.union(SigHashType::ANYONE_CAN_PAY);

/// Reserves coins in the store until dropped.
struct CoinLocks<'a, S: WalletStore + ?Sized> {
    store: &'a S,
    outpoints: Vec<Outpoint>,
}

impl<'a, S: WalletStore + ?Sized> CoinLocks<'a, S> {
    fn new(store: &'a S) -> Self {
        Self {
            store,
            outpoints: Vec::new(),
        }
    }

    fn lock(&mut self, outpoint: Outpoint) -> Result<(), WalletError> {
        self.store.lock_coin(&outpoint).map_err(|e| match e {
            StoreError::CoinLocked(_) => WalletError::Precondition(e.to_string()),
            other => other.into(),
        })?;
        self.outpoints.push(outpoint);
        Ok(())
    }
}

impl<S: WalletStore + ?Sized> Drop for CoinLocks<'_, S> {
    fn drop(&mut self) {
        for outpoint in &self.outpoints {
            self.store.unlock_coin(outpoint);
        }
    }
}

/// Funding appends change after the payment: `[finalize, payment, change]`
/// becomes `[finalize, change, payment]` so the seller's signature again
/// commits to the payment. Any other shape is left alone.
pub fn restore_payment_last(tx: &mut Transaction) {
    if tx.outputs.len() == 3 {
        tx.outputs.swap(1, 2);
    }
}

fn precondition(reason: impl Into<String>) -> WalletError {
    WalletError::Precondition(reason.into())
}

pub struct Settlement<S, C, T> {
    store: Arc<S>,
    chain: Arc<C>,
    sleeper: T,
    config: WalletConfig,
}

impl<S, C, T> Settlement<S, C, T>
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
    ) -> Result<Self, WalletError> {
        config.validate()?;
        Ok(Self {
            store,
            chain,
            sleeper,
            config,
        })
    }

    fn require_signer(&self) -> Result<(), WalletError> {
        if self.store.is_watch_only() {
            return Err(precondition("watch-only wallet cannot sign"));
        }
        Ok(())
    }

    /// Seller step. Returns the hex offer to hand to the buyer.
    pub fn build_finalization_offer(
        &self,
        name: &str,
        funding_address: &Address,
        name_receive_address: &Address,
        price_whole: u64,
    ) -> Result<String, WalletError> {
        if price_whole > self.config.max_offer_price_whole {
            return Err(precondition(format!(
                "price {price_whole} exceeds the ceiling of {}",
                self.config.max_offer_price_whole
            )));
        }
        self.require_signer()?;
        let price = Amount::from_whole(price_whole)
            .ok_or_else(|| precondition(format!("price {price_whole} overflows")))?;

        let state = self
            .store
            .name_state(name)?
            .ok_or_else(|| precondition(format!("name {name} is not owned by this wallet")))?;
        let coin = self
            .store
            .coin(&state.owner)?
            .ok_or_else(|| precondition(format!("owner coin of {name} not found")))?;
        if coin.covenant.kind != CovenantType::Transfer {
            return Err(precondition(format!(
                "{name} is not being transferred (owner coin is {:?})",
                coin.covenant.kind
            )));
        }
        if transfer_recipient(&coin.covenant) != Some(*name_receive_address) {
            return Err(precondition(format!(
                "{name} is being transferred to a different address"
            )));
        }

        let mut locks = CoinLocks::new(&*self.store);
        locks.lock(coin.outpoint)?;

        let renewal_block = self.store.renewal_block()?;
        let mut tx = Transaction::new();
        tx.add_coin(&coin);
        tx.outputs.push(Output {
            value: coin.value,
            address: *name_receive_address,
            covenant: finalize_covenant(&state, &renewal_block),
        });
        tx.outputs.push(Output::payment(price, *funding_address));

        let keys = self.store.derive_signing_keys(&tx)?;
        if keys.len() != 1 {
            return Err(WalletError::SignatureCount {
                expected: 1,
                actual: keys.len(),
            });
        }
        let view = CoinView::from_coins([&coin]);
        let signed = sign_transaction(&mut tx, &view, &keys, OFFER_SIGHASH);
        if signed != 1 {
            return Err(WalletError::SignatureCount {
                expected: 1,
                actual: signed,
            });
        }
        verify_inputs(&tx, &view)?;

        info!(
            name,
            price = %price,
            hash = %hash_transaction(&tx),
            "built finalization offer"
        );
        Ok(tx.to_hex())
    }

    /// Buyer step. Funds, signs and broadcasts the offer, then waits for it
    /// to reach the mempool.
    pub async fn accept_finalization_offer(
        &self,
        offer_hex: &str,
    ) -> Result<Transaction, WalletError> {
        let mut tx = Transaction::from_hex(offer_hex)?;
        self.require_signer()?;
        if tx.inputs.len() != 1 || tx.outputs.len() != 2 {
            return Err(precondition(format!(
                "offer must have one input and two outputs, has {} and {}",
                tx.inputs.len(),
                tx.outputs.len()
            )));
        }
        if tx.output_value().is_none() {
            return Err(precondition("offer output values overflow"));
        }
        let seller_input = tx.inputs[0].clone();

        let name_coin = self
            .chain
            .coin(&seller_input.prevout)
            .await?
            .ok_or_else(|| precondition("name coin is spent or unknown to the node"))?;
        if name_coin.covenant.kind != CovenantType::Transfer {
            return Err(precondition(format!(
                "offered coin carries a {:?} covenant, not a transfer",
                name_coin.covenant.kind
            )));
        }
        let finalize = &tx.outputs[0];
        if finalize.covenant.kind != CovenantType::Finalize
            || finalize.covenant.name_hash() != name_coin.covenant.name_hash()
            || Some(finalize.address) != transfer_recipient(&name_coin.covenant)
        {
            return Err(precondition(
                "output 0 does not finalize the offered name to the transfer recipient",
            ));
        }

        let mut coins = self.store.spendable_coins()?;
        coins.push(name_coin);
        let options = FundingOptions {
            change_address: self.store.change_address()?,
            rate: self.store.estimate_fee()?,
        };
        self.store.fund_transaction(&mut tx, &coins, &options)?;

        // The funder rebuilds inputs without witnesses.
        if tx.inputs.first().map(|i| i.prevout) != Some(seller_input.prevout) {
            return Err(WalletError::Verification(
                "funding moved the offered input".into(),
            ));
        }
        tx.inputs[0] = seller_input;
        restore_payment_last(&mut tx);

        let mut locks = CoinLocks::new(&*self.store);
        for input in &tx.inputs[1..] {
            locks.lock(input.prevout)?;
        }

        let keys = self.store.derive_signing_keys(&tx)?;
        let view = CoinView::from_coins(coins.iter());
        let signed = sign_transaction(&mut tx, &view, &keys, SigHashType::ALL);
        let expected = tx.inputs.len() - 1;
        if signed != expected {
            return Err(WalletError::SignatureCount {
                expected,
                actual: signed,
            });
        }
        verify_transaction(&tx, &view)?;

        let hash = hash_transaction(&tx);
        self.chain.broadcast(&tx).await?;
        info!(%hash, inputs = tx.inputs.len(), outputs = tx.outputs.len(), "broadcast finalization");
        self.await_mempool(hash).await?;
        Ok(tx)
    }

    /// Poll the node's mempool for `hash` within the configured retry budget.
    async fn await_mempool(&self, hash: TxHash) -> Result<(), WalletError> {
        let attempts = self.config.mempool_poll_attempts;
        for attempt in 1..=attempts {
            self.sleeper.sleep(self.config.mempool_poll_interval()).await;
            match self.chain.raw_mempool().await {
                Ok(mempool) if mempool.contains(&hash) => {
                    info!(%hash, attempt, "transaction in mempool");
                    return Ok(());
                }
                Ok(_) => debug!(%hash, attempt, "transaction not in mempool yet"),
                Err(e) => warn!(%hash, attempt, error = %e, "mempool query failed"),
            }
        }
        Err(WalletError::BroadcastTimeout { hash, attempts })
    }
}
