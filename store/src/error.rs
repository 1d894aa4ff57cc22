use hnsw_types::{Amount, BlockHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    #[error("block at height {got} does not extend wallet tip {tip}")]
    NonContiguousBlock { tip: u32, got: u32 },

    #[error("block {hash} conflicts with the block already applied at height {height}")]
    ConflictingBlock { height: u32, hash: BlockHash },

    #[error("coin is locked by another operation: {0}")]
    CoinLocked(String),

    #[error("value overflow in {0}")]
    ValueOverflow(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}
