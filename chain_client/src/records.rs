//! Wire records returned by the node.
//!
//! Hashes, roots, witnesses and covenant items arrive as hex strings and
//! chainwork as big-endian hex. Each record decodes into its wallet type in
//! one step; a malformed field fails the whole record.

use hnsw_crypto::{decode_address, hash_transaction};
use hnsw_types::{
    decode_hex, decode_hex_array, Amount, BlockHash, ChainEntry, Coin, Covenant, CovenantType,
    DecodeError, Input, NetworkId, Outpoint, Output, Transaction, TransactionRecord, TxHash,
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChainEntry {
    pub hash: String,
    pub height: u32,
    #[serde(default)]
    pub version: u32,
    pub prev_block: String,
    pub merkle_root: String,
    pub witness_root: String,
    pub tree_root: String,
    pub reserved_root: String,
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub bits: u32,
    #[serde(default)]
    pub nonce: u32,
    pub extra_nonce: String,
    pub mask: String,
    #[serde(default)]
    pub chainwork: Option<String>,
}

impl RawChainEntry {
    pub fn decode(&self) -> Result<ChainEntry, DecodeError> {
        let chainwork = match &self.chainwork {
            Some(hex) => BigUint::from_bytes_be(&decode_hex("chainwork", hex)?),
            None => BigUint::default(),
        };
        Ok(ChainEntry {
            hash: BlockHash::from_hex("hash", &self.hash)?,
            height: self.height,
            version: self.version,
            prev_block: BlockHash::from_hex("prevBlock", &self.prev_block)?,
            merkle_root: decode_hex_array("merkleRoot", &self.merkle_root)?,
            witness_root: decode_hex_array("witnessRoot", &self.witness_root)?,
            tree_root: decode_hex_array("treeRoot", &self.tree_root)?,
            reserved_root: decode_hex_array("reservedRoot", &self.reserved_root)?,
            time: self.time,
            bits: self.bits,
            nonce: self.nonce,
            extra_nonce: decode_hex("extraNonce", &self.extra_nonce)?,
            mask: decode_hex_array("mask", &self.mask)?,
            chainwork,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawCovenant {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub items: Vec<String>,
}

impl RawCovenant {
    pub fn decode(&self) -> Result<Covenant, DecodeError> {
        let items = self
            .items
            .iter()
            .map(|item| decode_hex("covenant item", item))
            .collect::<Result<_, _>>()?;
        Ok(Covenant {
            kind: CovenantType::try_from(self.kind)?,
            items,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawOutpoint {
    pub hash: String,
    pub index: u32,
}

impl RawOutpoint {
    pub fn decode(&self) -> Result<Outpoint, DecodeError> {
        Ok(Outpoint::new(TxHash::from_hex(&self.hash)?, self.index))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawCoin {
    pub hash: String,
    pub index: u32,
    pub value: u64,
    pub address: String,
    #[serde(default)]
    pub covenant: Option<RawCovenant>,
    /// -1 while unconfirmed.
    #[serde(default = "unconfirmed")]
    pub height: i64,
    #[serde(default)]
    pub coinbase: bool,
}

fn unconfirmed() -> i64 {
    -1
}

fn confirmed_height(height: i64) -> Option<u32> {
    u32::try_from(height).ok()
}

fn decode_covenant(raw: &Option<RawCovenant>) -> Result<Covenant, DecodeError> {
    raw.as_ref()
        .map(RawCovenant::decode)
        .transpose()
        .map(Option::unwrap_or_default)
}

fn decode_network_address(s: &str, network: NetworkId) -> Result<hnsw_types::Address, DecodeError> {
    let (found, address) = decode_address(s)?;
    if found != network {
        return Err(DecodeError::Address(format!(
            "{s}: address is for {found}, expected {network}"
        )));
    }
    Ok(address)
}

impl RawCoin {
    pub fn decode(&self, network: NetworkId) -> Result<Coin, DecodeError> {
        Ok(Coin {
            outpoint: Outpoint::new(TxHash::from_hex(&self.hash)?, self.index),
            value: Amount::new(self.value),
            address: decode_network_address(&self.address, network)?,
            covenant: decode_covenant(&self.covenant)?,
            height: confirmed_height(self.height),
            coinbase: self.coinbase,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawInput {
    pub prevout: RawOutpoint,
    #[serde(default)]
    pub witness: Vec<String>,
    #[serde(default = "default_sequence")]
    pub sequence: u32,
    #[serde(default)]
    pub coin: Option<RawCoin>,
}

fn default_sequence() -> u32 {
    u32::MAX
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawOutput {
    pub value: u64,
    pub address: String,
    #[serde(default)]
    pub covenant: Option<RawCovenant>,
}

impl RawOutput {
    pub fn decode(&self, network: NetworkId) -> Result<Output, DecodeError> {
        Ok(Output {
            value: Amount::new(self.value),
            address: decode_network_address(&self.address, network)?,
            covenant: decode_covenant(&self.covenant)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default = "unconfirmed")]
    pub height: i64,
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub locktime: u32,
    pub inputs: Vec<RawInput>,
    pub outputs: Vec<RawOutput>,
}

impl RawTransaction {
    pub fn decode(&self, network: NetworkId) -> Result<TransactionRecord, DecodeError> {
        let mut tx = Transaction::new();
        tx.version = self.version;
        tx.locktime = self.locktime;

        let mut input_coins = Vec::with_capacity(self.inputs.len());
        for raw in &self.inputs {
            let witness = raw
                .witness
                .iter()
                .map(|w| decode_hex("witness", w))
                .collect::<Result<_, _>>()?;
            tx.inputs.push(Input {
                prevout: raw.prevout.decode()?,
                witness,
                sequence: raw.sequence,
            });
            input_coins.push(raw.coin.as_ref().map(|c| c.decode(network)).transpose()?);
        }
        for raw in &self.outputs {
            tx.outputs.push(raw.decode(network)?);
        }

        if let Some(expected) = &self.hash {
            let expected = TxHash::from_hex(expected)?;
            let actual = hash_transaction(&tx);
            if actual != expected {
                return Err(DecodeError::Transaction(format!(
                    "hash mismatch: node sent {expected}, computed {actual}"
                )));
            }
        }

        let block_hash = self
            .block
            .as_deref()
            .map(|b| BlockHash::from_hex("block", b))
            .transpose()?;

        Ok(TransactionRecord {
            tx,
            height: confirmed_height(self.height),
            index: u32::try_from(self.index).unwrap_or(0),
            block_hash,
            input_coins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hnsw_crypto::{address_from_public_key, encode_address, keypair_from_seed};

    fn hex32(b: u8) -> String {
        hex::encode([b; 32])
    }

    fn raw_entry() -> RawChainEntry {
        RawChainEntry {
            hash: hex32(1),
            height: 7,
            version: 0,
            prev_block: hex32(2),
            merkle_root: hex32(3),
            witness_root: hex32(4),
            tree_root: hex32(5),
            reserved_root: hex32(6),
            time: 1_600_000_000,
            bits: 0x1d00ffff,
            nonce: 9,
            extra_nonce: hex::encode([0u8; 24]),
            mask: hex32(7),
            chainwork: Some("0100".into()),
        }
    }

    fn address_string(seed: u8) -> String {
        let kp = keypair_from_seed(&[seed; 32]);
        encode_address(&address_from_public_key(&kp.public), NetworkId::Regtest)
    }

    #[test]
    fn entry_fields_decode_to_raw_bytes() {
        let entry = raw_entry().decode().unwrap();
        assert_eq!(entry.hash, BlockHash::new([1; 32]));
        assert_eq!(entry.prev_block, BlockHash::new([2; 32]));
        assert_eq!(entry.mask, [7; 32]);
        assert_eq!(entry.extra_nonce.len(), 24);
        assert_eq!(entry.chainwork, BigUint::from(256u32));
    }

    #[test]
    fn entry_from_node_json() {
        let json = serde_json::to_value(raw_entry()).unwrap();
        assert!(json.get("prevBlock").is_some());
        let parsed: RawChainEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.decode().unwrap().height, 7);
    }

    #[test]
    fn malformed_root_is_fatal() {
        let mut raw = raw_entry();
        raw.tree_root = "not hex".into();
        assert!(matches!(
            raw.decode(),
            Err(DecodeError::Hex { field: "treeRoot", .. })
        ));
    }

    #[test]
    fn malformed_chainwork_is_fatal() {
        let mut raw = raw_entry();
        raw.chainwork = Some("xyz".into());
        assert!(raw.decode().is_err());
    }

    #[test]
    fn missing_chainwork_is_zero() {
        let mut raw = raw_entry();
        raw.chainwork = None;
        assert_eq!(raw.decode().unwrap().chainwork, BigUint::default());
    }

    #[test]
    fn transaction_record_decodes_covenants_and_witnesses() {
        let raw = RawTransaction {
            hash: None,
            height: 12,
            index: 3,
            block: Some(hex32(8)),
            version: 0,
            locktime: 0,
            inputs: vec![RawInput {
                prevout: RawOutpoint {
                    hash: hex32(9),
                    index: 1,
                },
                witness: vec!["aabb".into()],
                sequence: u32::MAX,
                coin: None,
            }],
            outputs: vec![RawOutput {
                value: 1_000,
                address: address_string(1),
                covenant: Some(RawCovenant {
                    kind: 9,
                    items: vec![hex32(1), "0a000000".into()],
                }),
            }],
        };
        let record = raw.decode(NetworkId::Regtest).unwrap();
        assert_eq!(record.height, Some(12));
        assert_eq!(record.index, 3);
        assert_eq!(record.tx.inputs[0].witness, vec![vec![0xaa, 0xbb]]);
        let cov = &record.tx.outputs[0].covenant;
        assert_eq!(cov.kind, CovenantType::Transfer);
        assert_eq!(cov.read_u32(1), Some(10));
    }

    #[test]
    fn transaction_hash_mismatch_is_rejected() {
        let raw = RawTransaction {
            hash: Some(hex32(0xee)),
            height: -1,
            index: 0,
            block: None,
            version: 0,
            locktime: 0,
            inputs: vec![],
            outputs: vec![],
        };
        let err = raw.decode(NetworkId::Regtest).unwrap_err();
        assert!(matches!(err, DecodeError::Transaction(_)));
    }

    #[test]
    fn coin_on_wrong_network_is_rejected() {
        let raw = RawCoin {
            hash: hex32(1),
            index: 0,
            value: 5,
            address: address_string(2),
            covenant: None,
            height: 3,
            coinbase: false,
        };
        assert!(raw.decode(NetworkId::Regtest).is_ok());
        assert!(raw.decode(NetworkId::Main).is_err());
    }
}
