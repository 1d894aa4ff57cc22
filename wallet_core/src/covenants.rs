//! Item layouts of the name-transfer covenants.
//!
//! Transfer: `[name_hash, height, address_version, address_hash]`.
//! Finalize: `[name_hash, height, name, flags, claimed, renewals, renewal_block]`.

use hnsw_types::{Address, BlockHash, Covenant, CovenantType, NameHash, NameState};

pub fn transfer_covenant(name_hash: &NameHash, height: u32, recipient: &Address) -> Covenant {
    let mut covenant = Covenant::new(CovenantType::Transfer);
    covenant
        .push_hash(name_hash.as_bytes())
        .push_u32(height)
        .push_u8(recipient.version())
        .push(recipient.hash().to_vec());
    covenant
}

/// Recipient named by a Transfer covenant.
pub fn transfer_recipient(covenant: &Covenant) -> Option<Address> {
    if covenant.kind != CovenantType::Transfer {
        return None;
    }
    let version = covenant.read_u8(2)?;
    let hash: [u8; Address::HASH_LEN] = covenant.item(3)?.try_into().ok()?;
    Some(Address::new(version, hash))
}

pub fn finalize_covenant(name: &NameState, renewal_block: &BlockHash) -> Covenant {
    let mut covenant = Covenant::new(CovenantType::Finalize);
    covenant
        .push_hash(name.name_hash.as_bytes())
        .push_u32(name.height)
        .push(name.name.as_bytes().to_vec())
        .push_u8(name.flags())
        .push_u32(name.claimed)
        .push_u32(name.renewals)
        .push_hash(renewal_block.as_bytes());
    covenant
}

#[cfg(test)]
mod tests {
    use super::*;
    use hnsw_types::{Outpoint, TxHash};

    #[test]
    fn transfer_recipient_reads_back() {
        let recipient = Address::new(0, [7; 20]);
        let covenant = transfer_covenant(&NameHash::new([1; 32]), 12, &recipient);
        assert_eq!(transfer_recipient(&covenant), Some(recipient));
        assert_eq!(covenant.read_u32(1), Some(12));
        assert_eq!(transfer_recipient(&Covenant::none()), None);
    }

    #[test]
    fn finalize_carries_name_state() {
        let name = NameState {
            name: "example".into(),
            name_hash: NameHash::new([1; 32]),
            height: 10,
            renewal: 20,
            owner: Outpoint::new(TxHash::ZERO, 0),
            weak: true,
            claimed: 1,
            renewals: 4,
            transfer: 30,
        };
        let covenant = finalize_covenant(&name, &BlockHash::new([9; 32]));
        assert_eq!(covenant.name_hash(), Some(name.name_hash));
        assert_eq!(covenant.item(2), Some(&b"example"[..]));
        assert_eq!(covenant.read_u8(3), Some(1));
        assert_eq!(covenant.read_u32(5), Some(4));
        assert_eq!(covenant.read_hash(6), Some([9; 32]));
    }
}
