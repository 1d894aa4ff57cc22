use proptest::prelude::*;

use hnsw_types::{Amount, Covenant, CovenantType, Transaction, TxHash};

proptest! {
    /// Integer covenant items read back as the value that was pushed.
    #[test]
    fn covenant_u32_items_read_back(values in prop::collection::vec(any::<u32>(), 0..8)) {
        let mut cov = Covenant::new(CovenantType::Finalize);
        for v in &values {
            cov.push_u32(*v);
        }
        for (i, v) in values.iter().enumerate() {
            prop_assert_eq!(cov.read_u32(i), Some(*v));
        }
    }

    /// Whole-unit conversion is exact whenever it does not overflow.
    #[test]
    fn from_whole_scales_by_coin(whole in 0u64..=u64::MAX / Amount::COIN) {
        let amount = Amount::from_whole(whole).unwrap();
        prop_assert_eq!(amount.base_units() / Amount::COIN, whole);
        prop_assert_eq!(amount.base_units() % Amount::COIN, 0);
    }

    /// Arbitrary bytes never panic the transaction decoder.
    #[test]
    fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Transaction::decode(&bytes);
    }

    /// TxHash hex parsing accepts exactly what Display produces.
    #[test]
    fn tx_hash_display_parses(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        prop_assert_eq!(TxHash::from_hex(&hash.to_string()).unwrap(), hash);
    }
}
