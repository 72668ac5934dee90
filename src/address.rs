//! Base58Check addresses
//!
//! An address string is `base58(prefix ‖ hash160(pubkey) ‖ checksum32(prefix ‖ hash160(pubkey)))`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};
use crate::hashing::{base58_decode, base58_encode, checksum32, hash160};
use crate::types::Hash160;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub encoded: String,
    pub prefix: u8,
    pub pubkey_hash: Hash160,
    pub checksum: [u8; 4],
}

impl Address {
    /// Decode and validate an address string.
    pub fn parse(address: &str) -> Result<Self> {
        let full = base58_decode(address)
            .map_err(|e| ChainError::InvalidAddress(format!("{address}: {e}")))?;
        // prefix + 20-byte hash + 4-byte checksum
        if full.len() != 1 + 20 + 4 {
            return Err(ChainError::InvalidAddress(format!(
                "{address}: decoded to {} bytes",
                full.len()
            )));
        }

        let (extended, checksum) = full.split_at(full.len() - 4);
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash.copy_from_slice(&extended[1..]);

        let addr = Address {
            encoded: address.to_string(),
            prefix: extended[0],
            pubkey_hash,
            checksum: [checksum[0], checksum[1], checksum[2], checksum[3]],
        };

        if !addr.is_valid() {
            return Err(ChainError::InvalidAddress(format!("{address}: checksum mismatch")));
        }
        Ok(addr)
    }

    /// Derive the address of a raw public key under `prefix`.
    pub fn derive(public_key: &[u8], prefix: u8) -> Self {
        Self::from_pubkey_hash(hash160(public_key), prefix)
    }

    pub fn from_pubkey_hash(pubkey_hash: Hash160, prefix: u8) -> Self {
        let extended = extended_hash(prefix, &pubkey_hash);
        let checksum = checksum32(&extended);

        let mut full = extended;
        full.extend_from_slice(&checksum);

        Address {
            encoded: base58_encode(&full),
            prefix,
            pubkey_hash,
            checksum,
        }
    }

    /// checksum == checksum32(prefix ‖ pubkey_hash)
    pub fn is_valid(&self) -> bool {
        checksum32(&extended_hash(self.prefix, &self.pubkey_hash)) == self.checksum
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

fn extended_hash(prefix: u8, pubkey_hash: &Hash160) -> Vec<u8> {
    let mut extended = Vec::with_capacity(21);
    extended.push(prefix);
    extended.extend_from_slice(pubkey_hash);
    extended
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl FromStr for Address {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}
