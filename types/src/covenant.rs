//! Covenants: typed protocol state attached to transaction outputs.
//!
//! A covenant is a type tag plus an ordered list of opaque items. Integer
//! items are little-endian. Name-bearing covenants carry the name hash as
//! item 0 and the name's registration height as item 1.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::hash::NameHash;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CovenantType {
    None = 0,
    Claim = 1,
    Open = 2,
    Bid = 3,
    Reveal = 4,
    Redeem = 5,
    Register = 6,
    Update = 7,
    Renew = 8,
    Transfer = 9,
    Finalize = 10,
    Revoke = 11,
}

impl CovenantType {
    /// Whether item 0 of this covenant is a name hash.
    pub fn is_name(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl TryFrom<u8> for CovenantType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::None,
            1 => Self::Claim,
            2 => Self::Open,
            3 => Self::Bid,
            4 => Self::Reveal,
            5 => Self::Redeem,
            6 => Self::Register,
            7 => Self::Update,
            8 => Self::Renew,
            9 => Self::Transfer,
            10 => Self::Finalize,
            11 => Self::Revoke,
            other => return Err(DecodeError::CovenantType(other)),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Covenant {
    pub kind: CovenantType,
    pub items: Vec<Vec<u8>>,
}

impl Default for Covenant {
    fn default() -> Self {
        Self::none()
    }
}

impl Covenant {
    pub fn new(kind: CovenantType) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    /// A plain value output with no protocol state.
    pub fn none() -> Self {
        Self::new(CovenantType::None)
    }

    pub fn push(&mut self, item: impl Into<Vec<u8>>) -> &mut Self {
        self.items.push(item.into());
        self
    }

    pub fn push_hash(&mut self, hash: &[u8; 32]) -> &mut Self {
        self.push(hash.to_vec())
    }

    pub fn push_u8(&mut self, value: u8) -> &mut Self {
        self.push(vec![value])
    }

    pub fn push_u32(&mut self, value: u32) -> &mut Self {
        self.push(value.to_le_bytes().to_vec())
    }

    pub fn item(&self, index: usize) -> Option<&[u8]> {
        self.items.get(index).map(Vec::as_slice)
    }

    pub fn read_u8(&self, index: usize) -> Option<u8> {
        match self.item(index)? {
            [b] => Some(*b),
            _ => None,
        }
    }

    pub fn read_u32(&self, index: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.item(index)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    pub fn read_hash(&self, index: usize) -> Option<[u8; 32]> {
        self.item(index)?.try_into().ok()
    }

    /// The name hash carried by a name covenant.
    pub fn name_hash(&self) -> Option<NameHash> {
        if !self.kind.is_name() {
            return None;
        }
        self.read_hash(0).map(NameHash::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_items_are_little_endian() {
        let mut cov = Covenant::new(CovenantType::Finalize);
        cov.push_u32(0x0102_0304).push_u8(7);
        assert_eq!(cov.item(0), Some(&[4u8, 3, 2, 1][..]));
        assert_eq!(cov.read_u32(0), Some(0x0102_0304));
        assert_eq!(cov.read_u8(1), Some(7));
        assert_eq!(cov.read_u32(1), None);
    }

    #[test]
    fn none_covenant_has_no_name() {
        let mut cov = Covenant::none();
        cov.push_hash(&[1; 32]);
        assert_eq!(cov.name_hash(), None);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert_eq!(
            CovenantType::try_from(12),
            Err(DecodeError::CovenantType(12))
        );
        assert_eq!(CovenantType::try_from(9).unwrap(), CovenantType::Transfer);
    }
}
