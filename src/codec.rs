//! Canonical binary encoding of ledger records
//!
//! Layout (bincode 1.x default configuration):
//! - integers are fixed width, little-endian (`i64`/`u64` 8 bytes, `u32` 4, `u8` 1)
//! - `Vec<T>` and `String` carry a `u64` length prefix
//! - fixed arrays (`[u8; 32]`, `[u8; 20]`, `[u8; 4]`) are written inline
//! - struct fields follow declaration order, with no tags or names
//!
//! The encoding is the pre-image of every transaction id and block hash, so
//! changing it requires bumping `CODEC_VERSION`.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ChainError, Result};

pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| {
        ChainError::Serialization(format!(
            "cannot decode {}: {e}",
            std::any::type_name::<T>()
        ))
    })
}

/// Chain height as stored under `chainheight`
pub fn encode_height(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

pub fn decode_height(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| ChainError::Serialization(format!("chain height has {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TxInput, TxOutput, Transaction};

    fn sample() -> Transaction {
        Transaction {
            id: [7; 32],
            inputs: vec![TxInput {
                ref_txn_id: [1; 32],
                out_index: 2,
                signature: vec![0xaa, 0xbb],
                public_key: vec![],
            }],
            outputs: vec![TxOutput { value: 25, pubkey_hash: [9; 20] }],
        }
    }

    #[test]
    fn test_transaction_layout_is_fixed() {
        let bytes = serialize(&sample()).unwrap();
        // id
        assert_eq!(&bytes[..32], &[7u8; 32]);
        // inputs length prefix
        assert_eq!(&bytes[32..40], &1u64.to_le_bytes());
        // ref_txn_id then out_index
        assert_eq!(&bytes[40..72], &[1u8; 32]);
        assert_eq!(&bytes[72..80], &2i64.to_le_bytes());
        // signature with its length prefix
        assert_eq!(&bytes[80..88], &2u64.to_le_bytes());
        assert_eq!(&bytes[88..90], &[0xaa, 0xbb]);
        // empty public key
        assert_eq!(&bytes[90..98], &0u64.to_le_bytes());
        // one output: value then pubkey hash
        assert_eq!(&bytes[98..106], &1u64.to_le_bytes());
        assert_eq!(&bytes[106..114], &25u64.to_le_bytes());
        assert_eq!(&bytes[114..134], &[9u8; 20]);
        assert_eq!(bytes.len(), 134);
    }

    #[test]
    fn test_equal_records_encode_identically() {
        assert_eq!(serialize(&sample()).unwrap(), serialize(&sample().clone()).unwrap());
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        let bytes = serialize(&sample()).unwrap();
        let result: Result<Transaction> = deserialize(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(ChainError::Serialization(_))));
    }

    #[test]
    fn test_height_encoding() {
        assert_eq!(encode_height(1), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(decode_height(&encode_height(513)).unwrap(), 513);
        assert!(decode_height(&[1, 2, 3]).is_err());
    }
}
