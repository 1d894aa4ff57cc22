//! Cryptographic primitives for the hnsw wallet.
//!
//! - **Ed25519** for input signatures
//! - **Blake2b** for name hashes, transaction hashes and address key hashes
//! - Address string codec (`hs1…`, `rs1…`) with a Blake2b checksum
//! - Signature hashing under restricted scopes (`SINGLE_REVERSE | ANYONE_CAN_PAY`)

pub mod address;
pub mod hash;
pub mod keys;
pub mod sighash;
pub mod sign;

pub use address::{address_from_public_key, decode_address, encode_address, parse_address};
pub use hash::{blake2b_160, blake2b_256, blake2b_256_multi, hash_name, hash_transaction};
pub use keys::{keypair_from_private, keypair_from_seed, public_from_private};
pub use sighash::{committed_output, signature_hash, SigHashType};
pub use sign::{sign_message, verify_signature};
