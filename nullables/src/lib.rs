//! Nullable infrastructure for deterministic testing.
//!
//! The wallet's external collaborators (the wallet database, the full node
//! and the timer) are abstracted behind traits. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be scripted programmatically (failures, mempool delays, hooks)
//! - Never touch the filesystem, the network or the wall clock
//!
//! Usage: swap real implementations for nullables in tests.

pub mod chain;
pub mod sleeper;
pub mod store;

pub use chain::NullChain;
pub use sleeper::NullSleeper;
pub use store::{NullWalletStore, WalletState};
