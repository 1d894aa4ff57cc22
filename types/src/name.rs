//! Per-name auction/ownership state.

use serde::{Deserialize, Serialize};

use crate::hash::NameHash;
use crate::transaction::Outpoint;

/// Wallet view of a name. Mutated only by the wallet store when covenant
/// transactions confirm.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameState {
    pub name: String,
    pub name_hash: NameHash,
    /// Height of the name's registration.
    pub height: u32,
    /// Height of the last state-changing transaction.
    pub renewal: u32,
    /// Coin currently holding the name.
    pub owner: Outpoint,
    /// Registered through the legacy reserved-name path.
    pub weak: bool,
    pub claimed: u32,
    pub renewals: u32,
    /// Height at which a pending transfer was started, 0 if none.
    pub transfer: u32,
}

impl NameState {
    /// Finalize covenant flags byte.
    pub fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.weak {
            flags |= 1;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::TxHash;

    fn state(weak: bool) -> NameState {
        NameState {
            name: "example".into(),
            name_hash: NameHash::new([1; 32]),
            height: 10,
            renewal: 10,
            owner: Outpoint::new(TxHash::ZERO, 0),
            weak,
            claimed: 0,
            renewals: 0,
            transfer: 0,
        }
    }

    #[test]
    fn weak_names_set_bit_zero() {
        assert_eq!(state(true).flags(), 1);
        assert_eq!(state(false).flags(), 0);
    }
}
