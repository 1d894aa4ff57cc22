//! Transactions as seen by the wallet.

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::block::BlockHash;
use crate::coin::Coin;
use crate::covenant::Covenant;
use crate::error::DecodeError;
use crate::hash::TxHash;

/// Upper bound on an encoded transaction accepted from a counterparty.
pub const MAX_TX_SIZE: u64 = 1_000_000;

/// Default input sequence (no relative lock).
pub const DEFAULT_SEQUENCE: u32 = u32::MAX;

/// Reference to a previous transaction output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Outpoint {
    pub hash: TxHash,
    pub index: u32,
}

impl Outpoint {
    pub fn new(hash: TxHash, index: u32) -> Self {
        Self { hash, index }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub prevout: Outpoint,
    pub witness: Vec<Vec<u8>>,
    pub sequence: u32,
}

impl Input {
    /// An unsigned input spending `prevout`.
    pub fn from_outpoint(prevout: Outpoint) -> Self {
        Self {
            prevout,
            witness: Vec::new(),
            sequence: DEFAULT_SEQUENCE,
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.witness.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Output {
    pub value: Amount,
    pub address: Address,
    pub covenant: Covenant,
}

impl Output {
    /// A plain value transfer with no covenant.
    pub fn payment(value: Amount, address: Address) -> Self {
        Self {
            value,
            address,
            covenant: Covenant::none(),
        }
    }
}

/// A mutable transaction: inputs and outputs in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub locktime: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

/// The witness-free view of an input, used for hashing.
#[derive(Serialize)]
struct BareInput<'a> {
    prevout: &'a Outpoint,
    sequence: u32,
}

#[derive(Serialize)]
struct BareTransaction<'a> {
    version: u32,
    inputs: Vec<BareInput<'a>>,
    outputs: &'a [Output],
    locktime: u32,
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            version: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            locktime: 0,
        }
    }

    /// Serialize the full transaction, witnesses included.
    pub fn encode(&self) -> Vec<u8> {
        wire_options()
            .serialize(self)
            .expect("transaction serialization should not fail")
    }

    /// Serialize without witnesses. The transaction hash commits to this.
    pub fn encode_without_witness(&self) -> Vec<u8> {
        let bare = BareTransaction {
            version: self.version,
            inputs: self
                .inputs
                .iter()
                .map(|input| BareInput {
                    prevout: &input.prevout,
                    sequence: input.sequence,
                })
                .collect(),
            outputs: &self.outputs,
            locktime: self.locktime,
        };
        wire_options()
            .serialize(&bare)
            .expect("transaction serialization should not fail")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        wire_options()
            .with_limit(MAX_TX_SIZE)
            .reject_trailing_bytes()
            .deserialize(bytes)
            .map_err(|e| DecodeError::Transaction(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn from_hex(value: &str) -> Result<Self, DecodeError> {
        let bytes = crate::error::decode_hex("transaction", value)?;
        Self::decode(&bytes)
    }

    /// Total output value, `None` if it overflows.
    pub fn output_value(&self) -> Option<Amount> {
        Amount::checked_sum(self.outputs.iter().map(|o| o.value))
    }

    pub fn add_coin(&mut self, coin: &Coin) {
        self.inputs.push(Input::from_outpoint(coin.outpoint));
    }
}

/// A transaction placed in resync ordering by its block height and position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub tx: Transaction,
    /// `None` while unconfirmed.
    pub height: Option<u32>,
    /// Position within the block.
    pub index: u32,
    pub block_hash: Option<BlockHash>,
    /// Snapshot of each spent coin, parallel to `tx.inputs`, when the node supplied one.
    pub input_coins: Vec<Option<Coin>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covenant::CovenantType;

    fn sample_tx() -> Transaction {
        let mut tx = Transaction::new();
        tx.inputs.push(Input {
            prevout: Outpoint::new(TxHash::new([3; 32]), 1),
            witness: vec![vec![1, 2, 3]],
            sequence: DEFAULT_SEQUENCE,
        });
        let mut cov = Covenant::new(CovenantType::Finalize);
        cov.push_hash(&[9; 32]).push_u32(42);
        tx.outputs.push(Output {
            value: Amount::new(5),
            address: Address::new(0, [7; 20]),
            covenant: cov,
        });
        tx
    }

    #[test]
    fn hex_roundtrip_preserves_witness() {
        let tx = sample_tx();
        let decoded = Transaction::from_hex(&tx.to_hex()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn bare_encoding_ignores_witness() {
        let tx = sample_tx();
        let mut stripped = tx.clone();
        stripped.inputs[0].witness.clear();
        assert_eq!(tx.encode_without_witness(), stripped.encode_without_witness());
        assert_ne!(tx.encode(), stripped.encode());
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = sample_tx().encode();
        bytes.push(0);
        assert!(Transaction::decode(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            Transaction::from_hex("zz"),
            Err(DecodeError::Hex { .. })
        ));
        assert!(matches!(
            Transaction::decode(&[1, 2, 3]),
            Err(DecodeError::Transaction(_))
        ));
    }
}
