//! Input signing and local transaction verification.
//!
//! A witness is `[signature || scope_byte, public_key]`. The public key must
//! hash to the spent coin's address and the signature must cover the
//! signature hash computed under the stated scope.

use hnsw_crypto::{
    address_from_public_key, committed_output, sign_message, signature_hash, verify_signature,
    SigHashType,
};
use hnsw_store::CoinView;
use hnsw_types::{
    Address, Amount, Coin, CovenantType, KeyPair, PublicKey, Signature, Transaction,
};
use std::collections::HashSet;

use crate::covenants::transfer_recipient;
use crate::WalletError;

const SIGNATURE_LEN: usize = 64;
const PUBLIC_KEY_LEN: usize = 32;

/// Witness for input `index` spending `coin`.
pub fn sign_input(
    tx: &Transaction,
    index: usize,
    coin: &Coin,
    keys: &KeyPair,
    ty: SigHashType,
) -> Vec<Vec<u8>> {
    let digest = signature_hash(tx, index, coin, ty);
    let signature = sign_message(&digest, &keys.private);
    let mut sig = signature.0.to_vec();
    sig.push(ty.as_byte());
    vec![sig, keys.public.0.to_vec()]
}

/// Sign every unsigned input whose coin is in `view` and owned by one of
/// `keys`. Returns how many inputs were signed.
pub fn sign_transaction(
    tx: &mut Transaction,
    view: &CoinView,
    keys: &[KeyPair],
    ty: SigHashType,
) -> usize {
    let by_address: Vec<(Address, &KeyPair)> = keys
        .iter()
        .map(|k| (address_from_public_key(&k.public), k))
        .collect();

    let mut signed = 0;
    for index in 0..tx.inputs.len() {
        if tx.inputs[index].is_signed() {
            continue;
        }
        let Some(coin) = view.get(&tx.inputs[index].prevout) else {
            continue;
        };
        let Some((_, key)) = by_address.iter().find(|(a, _)| *a == coin.address) else {
            continue;
        };
        let witness = sign_input(tx, index, coin, key, ty);
        tx.inputs[index].witness = witness;
        signed += 1;
    }
    signed
}

fn invalid(index: usize, reason: impl std::fmt::Display) -> WalletError {
    WalletError::Verification(format!("input {index}: {reason}"))
}

fn verify_witness(tx: &Transaction, index: usize, coin: &Coin) -> Result<(), WalletError> {
    let [sig, key] = tx.inputs[index].witness.as_slice() else {
        return Err(invalid(index, "witness must be [signature, public key]"));
    };
    if sig.len() != SIGNATURE_LEN + 1 || key.len() != PUBLIC_KEY_LEN {
        return Err(invalid(index, "malformed witness items"));
    }
    let ty = SigHashType::from_byte(sig[SIGNATURE_LEN])
        .ok_or_else(|| invalid(index, format!("unknown scope byte {:#04x}", sig[SIGNATURE_LEN])))?;
    if matches!(ty.base(), SigHashType::SINGLE | SigHashType::SINGLE_REVERSE)
        && committed_output(tx, index, ty).is_none()
    {
        return Err(invalid(index, format!("{ty:?} has no output to commit to")));
    }

    let mut public = [0u8; PUBLIC_KEY_LEN];
    public.copy_from_slice(key);
    let public = PublicKey(public);
    if address_from_public_key(&public) != coin.address {
        return Err(invalid(index, "public key does not own the coin"));
    }

    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(&sig[..SIGNATURE_LEN]);
    let digest = signature_hash(tx, index, coin, ty);
    if !verify_signature(&digest, &Signature(signature), &public) {
        return Err(invalid(index, "bad signature"));
    }
    Ok(())
}

/// A Transfer coin may only be spent into a matching Finalize (or a Revoke)
/// at the same index.
fn verify_transfer_spend(tx: &Transaction, index: usize, coin: &Coin) -> Result<(), WalletError> {
    let name_hash = coin.covenant.name_hash();
    let output = tx
        .outputs
        .get(index)
        .ok_or_else(|| invalid(index, "transfer coin has no paired output"))?;
    match output.covenant.kind {
        CovenantType::Revoke if output.covenant.name_hash() == name_hash => Ok(()),
        CovenantType::Finalize => {
            if output.covenant.name_hash() != name_hash {
                return Err(invalid(index, "finalize is for a different name"));
            }
            if Some(output.address) != transfer_recipient(&coin.covenant) {
                return Err(invalid(index, "finalize is not sent to the transfer recipient"));
            }
            if output.value != coin.value {
                return Err(invalid(index, "finalize value differs from the name coin"));
            }
            Ok(())
        }
        _ => Err(invalid(index, "transfer coin must be finalized or revoked")),
    }
}

/// Check every input's witness and name covenant rule against `view`, and
/// return the total input value. Value balance is not checked, so this also
/// accepts an offer the counterparty has yet to fund.
pub fn verify_inputs(tx: &Transaction, view: &CoinView) -> Result<Amount, WalletError> {
    if tx.inputs.is_empty() {
        return Err(WalletError::Verification("transaction has no inputs".into()));
    }
    let mut seen = HashSet::with_capacity(tx.inputs.len());
    let mut input_value = Amount::ZERO;
    for (index, input) in tx.inputs.iter().enumerate() {
        if !seen.insert(input.prevout) {
            return Err(invalid(index, "duplicate prevout"));
        }
        let coin = view
            .get(&input.prevout)
            .ok_or_else(|| invalid(index, "spent coin is unknown"))?;
        verify_witness(tx, index, coin)?;
        if coin.covenant.kind == CovenantType::Transfer {
            verify_transfer_spend(tx, index, coin)?;
        }
        input_value = input_value
            .checked_add(coin.value)
            .ok_or_else(|| invalid(index, "input value overflow"))?;
    }
    Ok(input_value)
}

/// Check signatures, value balance and name covenant rules against `view`.
pub fn verify_transaction(tx: &Transaction, view: &CoinView) -> Result<(), WalletError> {
    let input_value = verify_inputs(tx, view)?;
    let output_value = tx
        .output_value()
        .ok_or_else(|| WalletError::Verification("output value overflow".into()))?;
    if output_value > input_value {
        return Err(WalletError::Verification(format!(
            "outputs {output_value} exceed inputs {input_value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covenants::{finalize_covenant, transfer_covenant};
    use hnsw_crypto::keypair_from_seed;
    use hnsw_types::{BlockHash, NameHash, NameState, Outpoint, Output, TxHash};

    fn coin_for(keys: &KeyPair, tag: u8, value: u64) -> Coin {
        Coin::from_output(
            Outpoint::new(TxHash::new([tag; 32]), 0),
            &Output::payment(Amount::new(value), address_from_public_key(&keys.public)),
            Some(1),
        )
    }

    fn spend(coins: &[&Coin], outputs: Vec<Output>) -> Transaction {
        let mut tx = Transaction::new();
        for coin in coins {
            tx.add_coin(coin);
        }
        tx.outputs = outputs;
        tx
    }

    fn pay(value: u64) -> Output {
        Output::payment(Amount::new(value), Address::new(0, [9; 20]))
    }

    #[test]
    fn signed_transaction_verifies() {
        let keys = keypair_from_seed(&[1; 32]);
        let coin = coin_for(&keys, 1, 10_000);
        let view = CoinView::from_coins([&coin]);
        let mut tx = spend(&[&coin], vec![pay(9_000)]);
        assert_eq!(sign_transaction(&mut tx, &view, &[keys], SigHashType::ALL), 1);
        verify_transaction(&tx, &view).unwrap();
    }

    #[test]
    fn foreign_inputs_are_left_unsigned() {
        let ours = keypair_from_seed(&[1; 32]);
        let theirs = keypair_from_seed(&[2; 32]);
        let a = coin_for(&ours, 1, 10_000);
        let b = coin_for(&theirs, 2, 10_000);
        let view = CoinView::from_coins([&a, &b]);
        let mut tx = spend(&[&a, &b], vec![pay(9_000)]);
        assert_eq!(sign_transaction(&mut tx, &view, &[ours], SigHashType::ALL), 1);
        assert!(!tx.inputs[1].is_signed());
        assert!(matches!(
            verify_transaction(&tx, &view),
            Err(WalletError::Verification(_))
        ));
    }

    #[test]
    fn tampered_output_breaks_full_scope_signature() {
        let keys = keypair_from_seed(&[1; 32]);
        let coin = coin_for(&keys, 1, 10_000);
        let view = CoinView::from_coins([&coin]);
        let mut tx = spend(&[&coin], vec![pay(9_000)]);
        sign_transaction(&mut tx, &view, &[keys], SigHashType::ALL);
        tx.outputs[0].value = Amount::new(8_000);
        assert!(verify_transaction(&tx, &view).is_err());
    }

    #[test]
    fn overspending_is_rejected() {
        let keys = keypair_from_seed(&[1; 32]);
        let coin = coin_for(&keys, 1, 10_000);
        let view = CoinView::from_coins([&coin]);
        let mut tx = spend(&[&coin], vec![pay(10_001)]);
        sign_transaction(&mut tx, &view, &[keys], SigHashType::ALL);
        let err = verify_transaction(&tx, &view).unwrap_err();
        assert!(err.to_string().contains("exceed"));
    }

    fn transfer_setup() -> (KeyPair, Coin, NameState, Address) {
        let keys = keypair_from_seed(&[3; 32]);
        let recipient = Address::new(0, [0xbb; 20]);
        let name_hash = NameHash::new([4; 32]);
        let mut coin = coin_for(&keys, 5, 0);
        coin.covenant = transfer_covenant(&name_hash, 10, &recipient);
        let name = NameState {
            name: "example".into(),
            name_hash,
            height: 10,
            renewal: 10,
            owner: coin.outpoint,
            weak: false,
            claimed: 0,
            renewals: 0,
            transfer: 20,
        };
        (keys, coin, name, recipient)
    }

    #[test]
    fn transfer_must_be_finalized_to_its_recipient() {
        let (keys, coin, name, recipient) = transfer_setup();
        let view = CoinView::from_coins([&coin]);
        let finalize = finalize_covenant(&name, &BlockHash::ZERO);

        let mut good = spend(
            &[&coin],
            vec![Output {
                value: coin.value,
                address: recipient,
                covenant: finalize.clone(),
            }],
        );
        sign_transaction(&mut good, &view, &[keypair_from_seed(&[3; 32])], SigHashType::ALL);
        verify_transaction(&good, &view).unwrap();

        let mut stolen = spend(
            &[&coin],
            vec![Output {
                value: coin.value,
                address: Address::new(0, [0xee; 20]),
                covenant: finalize,
            }],
        );
        sign_transaction(&mut stolen, &view, &[keys], SigHashType::ALL);
        let err = verify_transaction(&stolen, &view).unwrap_err();
        assert!(err.to_string().contains("recipient"));
    }

    #[test]
    fn transfer_spent_as_plain_payment_is_rejected() {
        let (keys, coin, _, _) = transfer_setup();
        let view = CoinView::from_coins([&coin]);
        let mut tx = spend(&[&coin], vec![pay(0)]);
        sign_transaction(&mut tx, &view, &[keys], SigHashType::ALL);
        assert!(verify_transaction(&tx, &view).is_err());
    }

    #[test]
    fn unfunded_offer_passes_input_checks_only() {
        let (keys, coin, name, recipient) = transfer_setup();
        let view = CoinView::from_coins([&coin]);
        let mut offer = spend(
            &[&coin],
            vec![
                Output {
                    value: coin.value,
                    address: recipient,
                    covenant: finalize_covenant(&name, &BlockHash::ZERO),
                },
                pay(5_000),
            ],
        );
        let scope = SigHashType::SINGLE_REVERSE.union(SigHashType::ANYONE_CAN_PAY);
        assert_eq!(sign_transaction(&mut offer, &view, &[keys], scope), 1);

        assert_eq!(verify_inputs(&offer, &view).unwrap(), coin.value);
        assert!(verify_transaction(&offer, &view).is_err());
    }

    #[test]
    fn overflowing_outputs_fail_verification() {
        let keys = keypair_from_seed(&[1; 32]);
        let coin = coin_for(&keys, 1, 10_000);
        let view = CoinView::from_coins([&coin]);
        let mut tx = spend(&[&coin], vec![pay(u64::MAX), pay(2)]);
        sign_transaction(&mut tx, &view, &[keys], SigHashType::ALL);
        let err = verify_transaction(&tx, &view).unwrap_err();
        assert!(err.to_string().contains("overflow"));
    }
}
