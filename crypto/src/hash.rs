//! Blake2b hashing for names, transactions and key hashes.

use blake2::digest::consts::{U20, U32};
use blake2::{Blake2b, Digest};
use hnsw_types::{NameHash, Transaction, TxHash};

type Blake2b256 = Blake2b<U32>;
type Blake2b160 = Blake2b<U20>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// 160-bit Blake2b, used for address key hashes.
pub fn blake2b_160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Blake2b160::new();
    hasher.update(data);
    let mut output = [0u8; 20];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Hash a name. Names are case-insensitive ASCII; the lowercase form is hashed.
pub fn hash_name(name: &str) -> NameHash {
    NameHash::new(blake2b_256(name.to_ascii_lowercase().as_bytes()))
}

/// Witness-free transaction hash. Adding signatures never changes it.
pub fn hash_transaction(tx: &Transaction) -> TxHash {
    TxHash::new(blake2b_256(&tx.encode_without_witness()))
}
