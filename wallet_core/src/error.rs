use hnsw_chain_client::ChainError;
use hnsw_store::StoreError;
use hnsw_types::{DecodeError, TxHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    /// Malformed hex or binary input. Nothing was mutated.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Rejected before any mutation: price ceiling, missing coin, covenant
    /// mismatch, watch-only wallet.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("expected {expected} signature(s), produced {actual}")]
    SignatureCount { expected: usize, actual: usize },

    #[error("funding failed: {0}")]
    Funding(String),

    /// The transaction is still valid and may be resubmitted.
    #[error("transaction {hash} never appeared in mempool after {attempts} attempts")]
    BroadcastTimeout { hash: TxHash, attempts: u32 },

    #[error("transaction failed verification: {0}")]
    Verification(String),

    #[error("a rescan is already in progress")]
    RescanInProgress,

    #[error("operation cancelled by shutdown")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("wallet store error: {0}")]
    Store(StoreError),

    #[error("chain client error: {0}")]
    Chain(#[from] ChainError),
}

impl From<StoreError> for WalletError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientFunds { .. } | StoreError::ValueOverflow(_) => {
                WalletError::Funding(err.to_string())
            }
            other => WalletError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hnsw_types::Amount;

    #[test]
    fn insufficient_funds_is_a_funding_error() {
        let err: WalletError = StoreError::InsufficientFunds {
            needed: Amount::new(10),
            available: Amount::new(3),
        }
        .into();
        assert!(matches!(err, WalletError::Funding(_)));

        let err: WalletError = StoreError::Backend("disk".into()).into();
        assert!(matches!(err, WalletError::Store(StoreError::Backend(_))));
    }
}
