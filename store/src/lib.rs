//! Wallet state store interface for the hnsw wallet.
//!
//! The wallet database (UTXO index, name state, key-derivation trees) is an
//! external collaborator. The resync engine and settlement protocol depend
//! only on [`WalletStore`]; backends and test doubles implement it.

pub mod error;
pub mod funding;
pub mod view;
pub mod wallet;

pub use error::StoreError;
pub use funding::{fund, FundingOptions};
pub use view::CoinView;
pub use wallet::WalletStore;
