use hnsw_types::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("node request failed: {0}")]
    Request(String),

    #[error("node error: {0}")]
    Rpc(String),

    #[error("invalid node response: {0}")]
    InvalidResponse(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("transaction rejected: {0}")]
    Rejected(String),
}
