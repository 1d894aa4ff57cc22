//! Wallet core for a name-system wallet.
//!
//! Two pieces live here:
//! - the **resync engine** ([`ResyncEngine`]), which replays the node's
//!   canonical chain into the wallet store and reports progress, and
//! - the **settlement protocol** ([`Settlement`]), which hands a name to a
//!   buyer against an on-chain payment in a single offer/accept round.
//!
//! Both drive external collaborators through the [`WalletStore`] and
//! [`ChainClient`] traits and wait through a [`Sleeper`].
//!
//! [`WalletStore`]: hnsw_store::WalletStore
//! [`ChainClient`]: hnsw_chain_client::ChainClient
//! [`Sleeper`]: hnsw_utils::Sleeper

pub mod config;
pub mod covenants;
pub mod error;
pub mod events;
pub mod guard;
pub mod resync;
pub mod settlement;
pub mod signing;

pub use config::WalletConfig;
pub use error::WalletError;
pub use events::{EventBus, ProgressTracker, SyncEvent, SyncPhase, SyncProgress, SyncSession};
pub use guard::{RescanGuard, RescanLock};
pub use resync::{PollOutcome, ResyncEngine};
pub use settlement::{restore_payment_last, Settlement, OFFER_SIGHASH};
pub use signing::{sign_transaction, verify_inputs, verify_transaction};
