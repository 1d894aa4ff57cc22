//! Address string codec.
//!
//! Format: `<hrp>1` + base32(version ‖ key_hash ‖ checksum)
//!
//! - `hrp` is the network prefix (`hs`, `ts`, `rs`, `ss`).
//! - `key_hash` is Blake2b-160 of the Ed25519 public key.
//! - `checksum` is the first 4 bytes of Blake2b-256(hrp ‖ version ‖ key_hash).
//!
//! Base32 alphabet: `13456789abcdefghijkmnopqrstuwxyz` (avoids ambiguous chars).
//! The 25-byte payload encodes to exactly 40 characters.

use hnsw_types::{Address, DecodeError, NetworkId, PublicKey};

/// Base32 alphabet (32 chars, avoids visually ambiguous 0/O, 2/Z, l/I, v).
const BASE32_ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// Reverse lookup table: ASCII byte → 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let alpha = BASE32_ALPHABET;
    let mut i = 0;
    while i < 32 {
        table[alpha[i] as usize] = i as u8;
        i += 1;
    }
    table
};

const SEPARATOR: char = '1';
const PAYLOAD_LEN: usize = 1 + Address::HASH_LEN + CHECKSUM_LEN;
const CHECKSUM_LEN: usize = 4;
/// 25 bytes × 8 bits / 5 bits per char.
const ENCODED_LEN: usize = 40;

fn encode_base32(bytes: &[u8]) -> String {
    let mut result = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits_in_buffer += 8;
        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let idx = ((buffer >> bits_in_buffer) & 0x1F) as usize;
            result.push(BASE32_ALPHABET[idx] as char);
        }
    }
    if bits_in_buffer > 0 {
        let idx = ((buffer << (5 - bits_in_buffer)) & 0x1F) as usize;
        result.push(BASE32_ALPHABET[idx] as char);
    }

    result
}

fn decode_base32_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;
    let mut result = [0u8; N];
    let mut pos = 0;

    for c in s.bytes() {
        if c >= 128 {
            return None;
        }
        let val = BASE32_DECODE[c as usize];
        if val == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | val as u64;
        bits_in_buffer += 5;
        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            if pos < N {
                result[pos] = (buffer >> bits_in_buffer) as u8;
                pos += 1;
            }
        }
    }

    if pos < N {
        return None;
    }
    Some(result)
}

fn checksum(hrp: &str, version: u8, hash: &[u8; 20]) -> [u8; CHECKSUM_LEN] {
    let digest = crate::blake2b_256_multi(&[hrp.as_bytes(), &[version], hash]);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// The version-0 key-hash address of a public key.
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    Address::new(0, crate::blake2b_160(public_key.as_bytes()))
}

/// Render an address for display on `network`.
pub fn encode_address(address: &Address, network: NetworkId) -> String {
    let hrp = network.address_hrp();
    let mut payload = Vec::with_capacity(PAYLOAD_LEN);
    payload.push(address.version());
    payload.extend_from_slice(address.hash());
    payload.extend_from_slice(&checksum(hrp, address.version(), address.hash()));
    format!("{hrp}{SEPARATOR}{}", encode_base32(&payload))
}

/// Parse an address string, returning the network its prefix names.
pub fn decode_address(s: &str) -> Result<(NetworkId, Address), DecodeError> {
    let invalid = |reason: &str| DecodeError::Address(format!("{s}: {reason}"));

    let (hrp, encoded) = s
        .split_once(SEPARATOR)
        .ok_or_else(|| invalid("missing separator"))?;
    let network = NetworkId::from_hrp(hrp).ok_or_else(|| invalid("unknown prefix"))?;
    if encoded.len() != ENCODED_LEN {
        return Err(invalid("wrong length"));
    }
    let payload: [u8; PAYLOAD_LEN] =
        decode_base32_fixed(encoded).ok_or_else(|| invalid("invalid character"))?;

    let version = payload[0];
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..1 + Address::HASH_LEN]);
    if payload[1 + Address::HASH_LEN..] != checksum(hrp, version, &hash) {
        return Err(invalid("bad checksum"));
    }

    Ok((network, Address::new(version, hash)))
}

/// Parse an address that must belong to `network`.
pub fn parse_address(s: &str, network: NetworkId) -> Result<Address, DecodeError> {
    let (found, address) = decode_address(s)?;
    if found != network {
        return Err(DecodeError::Address(format!(
            "{s}: address is for {found}, expected {network}"
        )));
    }
    Ok(address)
}
