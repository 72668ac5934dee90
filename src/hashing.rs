//! Hashing and Base58 helpers

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::{ChainError, Result};
use crate::types::{Hash, Hash160};

/// Hash256: SHA256(SHA256(data))
pub fn hash256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&second);
    hash
}

/// Hash160: RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> Hash160 {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&ripe);
    hash
}

/// First four bytes of `hash256(data)`
pub fn checksum32(data: &[u8]) -> [u8; 4] {
    let hash = hash256(data);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Base58 with the Bitcoin alphabet. Checksums are handled by `Address`.
pub fn base58_encode(payload: &[u8]) -> String {
    bs58::encode(payload).into_string()
}

pub fn base58_decode(encoded: &str) -> Result<Vec<u8>> {
    bs58::decode(encoded)
        .into_vec()
        .map_err(|e| ChainError::Decode(format!("base58 '{encoded}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256_golden_vectors() {
        assert_eq!(
            hex::encode(hash256(b"hello")),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
        assert_eq!(
            hex::encode(hash256(b"world")),
            "63e5c163c81ee9a3ed99d365ff963ecea340cc455deeac7c4b63ac75b9cf4706"
        );
    }

    #[test]
    fn test_hash160_golden_vectors() {
        assert_eq!(
            hex::encode(hash160(b"hello")),
            "b6a9c8c230722b7c748331a8b450f05566dc7d0f"
        );
        assert_eq!(
            hex::encode(hash160(b"world")),
            "5fc3735525b88f0989429ea73a5bbf6cd61f0805"
        );
    }

    #[test]
    fn test_checksum32_is_hash256_prefix() {
        assert_eq!(checksum32(b"hello"), [0x95, 0x95, 0xc9, 0xdf]);
        assert_eq!(checksum32(b"world"), [0x63, 0xe5, 0xc1, 0x63]);
    }

    #[test]
    fn test_base58_vectors() {
        assert_eq!(base58_encode(b"hello"), "Cn8eVZg");
        assert_eq!(base58_encode(b"world"), "EUYUqQf");
        assert_eq!(base58_encode(b"1lL 0oO"), "2sdUXQxyyx");

        assert_eq!(base58_decode("Cn8eVZg").unwrap(), b"hello");
        assert_eq!(base58_decode("2sdUXQxyyx").unwrap(), b"1lL 0oO");
    }

    #[test]
    fn test_base58_rejects_invalid_alphabet() {
        // '0', 'O', 'I' and 'l' are not part of the alphabet
        for bad in ["0abc", "Oops", "Ilk", "hel lo"] {
            assert!(matches!(base58_decode(bad), Err(ChainError::Decode(_))));
        }
    }
}
