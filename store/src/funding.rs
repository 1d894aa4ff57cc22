//! Generic coin selection.
//!
//! The funder rebuilds the input list from scratch: inputs already present
//! are re-added first, in order, with empty witnesses, then plain-value coins
//! are added largest-first until the outputs and fee are covered. Callers
//! holding pre-signed inputs must restore them afterwards.

use hnsw_types::{Address, Amount, Coin, CovenantType, Output, Transaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::StoreError;

/// Estimated witness bytes per input: signature + scope byte + public key + framing.
pub const WITNESS_SIZE_ESTIMATE: u64 = 110;
/// Estimated encoded size of a change output.
pub const CHANGE_OUTPUT_SIZE_ESTIMATE: u64 = 64;
/// Change below this is left to the fee instead of creating an output.
pub const DUST_THRESHOLD: Amount = Amount::new(1_000);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingOptions {
    pub change_address: Address,
    /// Base units per 1000 bytes.
    pub rate: Amount,
}

fn overflow(what: &str) -> StoreError {
    StoreError::ValueOverflow(what.to_string())
}

fn estimate_fee(tx: &Transaction, rate: Amount) -> Result<Amount, StoreError> {
    let size = tx.encode().len() as u64
        + tx.inputs.len() as u64 * WITNESS_SIZE_ESTIMATE
        + CHANGE_OUTPUT_SIZE_ESTIMATE;
    rate.base_units()
        .checked_mul(size)
        .map(|fee| Amount::new(fee.div_ceil(1000)))
        .ok_or_else(|| overflow("fee"))
}

/// Fund `tx` from `coins` so that inputs cover outputs plus fee.
pub fn fund(tx: &mut Transaction, coins: &[Coin], options: &FundingOptions) -> Result<(), StoreError> {
    let mut existing = Vec::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        let coin = coins
            .iter()
            .find(|c| c.outpoint == input.prevout)
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "coin for existing input {}:{}",
                    input.prevout.hash, input.prevout.index
                ))
            })?;
        existing.push(coin.clone());
    }

    let mut candidates: Vec<&Coin> = coins
        .iter()
        .filter(|c| c.covenant.kind == CovenantType::None)
        .filter(|c| !existing.iter().any(|e| e.outpoint == c.outpoint))
        .collect();
    candidates.sort_by(|a, b| b.value.cmp(&a.value).then(a.outpoint.cmp(&b.outpoint)));
    let available = Amount::checked_sum(
        existing
            .iter()
            .map(|c| c.value)
            .chain(candidates.iter().map(|c| c.value)),
    )
    .ok_or_else(|| overflow("available coin value"))?;
    let total_out = tx.output_value().ok_or_else(|| overflow("output value"))?;

    tx.inputs.clear();
    for coin in &existing {
        tx.add_coin(coin);
    }
    let mut total_in = Amount::checked_sum(existing.iter().map(|c| c.value))
        .ok_or_else(|| overflow("input value"))?;

    let mut next = candidates.into_iter();
    let fee = loop {
        let fee = estimate_fee(tx, options.rate)?;
        let needed = total_out
            .checked_add(fee)
            .ok_or_else(|| overflow("output value plus fee"))?;
        if total_in >= needed {
            break fee;
        }
        match next.next() {
            Some(coin) => {
                tx.add_coin(coin);
                total_in = total_in
                    .checked_add(coin.value)
                    .ok_or_else(|| overflow("input value"))?;
            }
            None => return Err(StoreError::InsufficientFunds { needed, available }),
        }
    };

    let change = total_in - total_out - fee;
    if change >= DUST_THRESHOLD {
        tx.outputs.push(Output::payment(change, options.change_address));
    }
    debug!(
        inputs = tx.inputs.len(),
        outputs = tx.outputs.len(),
        fee = %fee,
        change = %change,
        "funded transaction"
    );
    Ok(())
}
