//! Decoding errors for data that crosses the wire boundary.

use thiserror::Error;

/// A malformed hex or binary field. Fatal for the record being decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid hex in {field}: {reason}")]
    Hex { field: &'static str, reason: String },

    #[error("{field} must be {expected} bytes, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid address: {0}")]
    Address(String),

    #[error("unknown covenant type: {0}")]
    CovenantType(u8),

    #[error("malformed transaction: {0}")]
    Transaction(String),
}

/// Decode a hex string field into raw bytes.
pub fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(value).map_err(|e| DecodeError::Hex {
        field,
        reason: e.to_string(),
    })
}

/// Decode a hex string field into a fixed-size array.
pub fn decode_hex_array<const N: usize>(
    field: &'static str,
    value: &str,
) -> Result<[u8; N], DecodeError> {
    let bytes = decode_hex(field, value)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| DecodeError::Length {
        field,
        expected: N,
        actual,
    })
}
