//! Unspent transaction outputs.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::covenant::Covenant;
use crate::transaction::{Outpoint, Output, Transaction};

/// An unspent output together with the outpoint that created it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub outpoint: Outpoint,
    pub value: Amount,
    pub address: Address,
    pub covenant: Covenant,
    /// Confirmation height, `None` while unconfirmed.
    pub height: Option<u32>,
    pub coinbase: bool,
}

impl Coin {
    pub fn from_output(outpoint: Outpoint, output: &Output, height: Option<u32>) -> Self {
        Self {
            outpoint,
            value: output.value,
            address: output.address,
            covenant: output.covenant.clone(),
            height,
            coinbase: false,
        }
    }

    /// Build the coin for output `index` of `tx`.
    pub fn from_tx(
        tx: &Transaction,
        hash: crate::hash::TxHash,
        index: u32,
        height: Option<u32>,
    ) -> Option<Self> {
        let output = tx.outputs.get(index as usize)?;
        Some(Self::from_output(Outpoint::new(hash, index), output, height))
    }
}
