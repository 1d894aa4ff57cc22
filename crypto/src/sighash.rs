//! Signature hashing under scope flags.
//!
//! For input `i` of a transaction with `n` outputs, the base scope decides
//! which outputs the signature commits to:
//!
//! | base | outputs committed |
//! |---|---|
//! | `ALL` | every output |
//! | `NONE` | none |
//! | `SINGLE` | output `i` |
//! | `SINGLE_REVERSE` | output `n - 1 - i` |
//!
//! `ANYONE_CAN_PAY` drops the commitment to other inputs, so inputs can be
//! appended after signing. `SINGLE`, `SINGLE_REVERSE` and `NONE` also drop
//! the commitment to other inputs' sequences.

use hnsw_types::{Coin, Output, Transaction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

const ZERO_HASH: [u8; 32] = [0u8; 32];

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigHashType(u8);

impl SigHashType {
    pub const ALL: Self = Self(1);
    pub const NONE: Self = Self(2);
    pub const SINGLE: Self = Self(3);
    pub const SINGLE_REVERSE: Self = Self(4);
    pub const ANYONE_CAN_PAY: Self = Self(0x80);

    const BASE_MASK: u8 = 0x1f;

    /// Parse the trailing scope byte of a witness signature.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let base = byte & Self::BASE_MASK;
        if !(1..=4).contains(&base) || byte & !(Self::BASE_MASK | 0x80) != 0 {
            return None;
        }
        Some(Self(byte))
    }

    pub fn as_byte(&self) -> u8 {
        self.0
    }

    pub fn base(&self) -> Self {
        Self(self.0 & Self::BASE_MASK)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn anyone_can_pay(&self) -> bool {
        self.0 & Self::ANYONE_CAN_PAY.0 != 0
    }
}

impl BitOr for SigHashType {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for SigHashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.base() {
            Self::ALL => "ALL",
            Self::NONE => "NONE",
            Self::SINGLE => "SINGLE",
            Self::SINGLE_REVERSE => "SINGLE_REVERSE",
            _ => "INVALID",
        };
        if self.anyone_can_pay() {
            write!(f, "{base}|ANYONE_CAN_PAY")
        } else {
            f.write_str(base)
        }
    }
}

fn hash_output(output: &Output) -> [u8; 32] {
    let bytes = bincode::serialize(output).expect("output serialization should not fail");
    crate::blake2b_256(&bytes)
}

fn hash_outputs(outputs: &[Output]) -> [u8; 32] {
    let hashes: Vec<[u8; 32]> = outputs.iter().map(hash_output).collect();
    let parts: Vec<&[u8]> = hashes.iter().map(|h| h.as_slice()).collect();
    crate::blake2b_256_multi(&parts)
}

/// Index of the single output committed to by `SINGLE`/`SINGLE_REVERSE` for `index`.
pub fn committed_output(tx: &Transaction, index: usize, ty: SigHashType) -> Option<usize> {
    let n = tx.outputs.len();
    if index >= n {
        return None;
    }
    match ty.base() {
        SigHashType::SINGLE => Some(index),
        SigHashType::SINGLE_REVERSE => Some(n - 1 - index),
        _ => None,
    }
}

/// Digest signed by input `index`, which spends `coin`, under scope `ty`.
pub fn signature_hash(tx: &Transaction, index: usize, coin: &Coin, ty: SigHashType) -> [u8; 32] {
    let input = &tx.inputs[index];
    let base = ty.base();

    let prevouts = if ty.anyone_can_pay() {
        ZERO_HASH
    } else {
        let mut buf = Vec::with_capacity(tx.inputs.len() * 36);
        for inp in &tx.inputs {
            buf.extend_from_slice(inp.prevout.hash.as_bytes());
            buf.extend_from_slice(&inp.prevout.index.to_le_bytes());
        }
        crate::blake2b_256(&buf)
    };

    let sequences = if ty.anyone_can_pay() || base != SigHashType::ALL {
        ZERO_HASH
    } else {
        let buf: Vec<u8> = tx
            .inputs
            .iter()
            .flat_map(|inp| inp.sequence.to_le_bytes())
            .collect();
        crate::blake2b_256(&buf)
    };

    let outputs = match base {
        SigHashType::ALL => hash_outputs(&tx.outputs),
        SigHashType::SINGLE | SigHashType::SINGLE_REVERSE => {
            match committed_output(tx, index, ty) {
                Some(i) => hash_output(&tx.outputs[i]),
                None => ZERO_HASH,
            }
        }
        _ => ZERO_HASH,
    };

    crate::blake2b_256_multi(&[
        &tx.version.to_le_bytes(),
        &prevouts,
        &sequences,
        input.prevout.hash.as_bytes(),
        &input.prevout.index.to_le_bytes(),
        &[coin.address.version()],
        coin.address.hash(),
        &coin.value.base_units().to_le_bytes(),
        &input.sequence.to_le_bytes(),
        &outputs,
        &tx.locktime.to_le_bytes(),
        &u32::from(ty.as_byte()).to_le_bytes(),
    ])
}
