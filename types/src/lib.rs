//! Fundamental types for the hnsw wallet.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! hashes, addresses, amounts, covenants, transactions, coins, name state and chain entries.
//! Binary fields that arrive as hex at the wire boundary are decoded here into raw bytes.

pub mod address;
pub mod amount;
pub mod block;
pub mod chain;
pub mod coin;
pub mod covenant;
pub mod error;
pub mod hash;
pub mod keys;
pub mod name;
pub mod network;
pub mod transaction;

pub use address::Address;
pub use amount::Amount;
pub use block::BlockHash;
pub use chain::ChainEntry;
pub use coin::Coin;
pub use covenant::{Covenant, CovenantType};
pub use error::{decode_hex, decode_hex_array, DecodeError};
pub use hash::{NameHash, TxHash};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use name::NameState;
pub use network::NetworkId;
pub use transaction::{Input, Outpoint, Output, Transaction, TransactionRecord};
