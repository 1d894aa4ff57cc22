//! Pay-to-key-hash destination.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Destination of an output: a witness version plus a 20-byte key hash.
///
/// The human-readable string form (`hs1…`, `rs1…`) depends on the network
/// and is produced by `hnsw_crypto::encode_address`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    version: u8,
    hash: [u8; 20],
}

impl Address {
    pub const HASH_LEN: usize = 20;

    pub fn new(version: u8, hash: [u8; 20]) -> Self {
        Self { version, hash }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash(&self) -> &[u8; 20] {
        &self.hash
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(v{}:", self.version)?;
        for b in &self.hash[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "\u{2026})")
    }
}
