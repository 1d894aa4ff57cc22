//! Chain query interface of the full node the wallet follows.
//!
//! The node process, its mempool and its chain index are external. This
//! crate defines what the wallet asks of them ([`ChainClient`]), a JSON-RPC
//! implementation over HTTP ([`NodeClient`]), and the decoding of the node's
//! hex-encoded wire records into wallet types.

pub mod client;
pub mod error;
pub mod node_client;
pub mod records;

pub use client::{ChainClient, ChainInfo};
pub use error::ChainError;
pub use node_client::NodeClient;
pub use records::{RawChainEntry, RawCoin, RawCovenant, RawInput, RawOutput, RawTransaction};
