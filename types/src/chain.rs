//! Chain entries: immutable block-header summaries.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::block::BlockHash;

/// Header summary of a block on the node's canonical chain. Identity is `hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub hash: BlockHash,
    pub height: u32,
    pub version: u32,
    pub prev_block: BlockHash,
    pub merkle_root: [u8; 32],
    pub witness_root: [u8; 32],
    pub tree_root: [u8; 32],
    pub reserved_root: [u8; 32],
    pub time: u64,
    pub bits: u32,
    pub nonce: u32,
    pub extra_nonce: Vec<u8>,
    pub mask: [u8; 32],
    /// Cumulative work up to and including this block.
    pub chainwork: BigUint,
}

impl ChainEntry {
    /// Whether `self` directly extends `parent`.
    pub fn extends(&self, parent: &ChainEntry) -> bool {
        self.prev_block == parent.hash && self.height == parent.height + 1
    }
}
