//! Key material collaborator
//!
//! A `Wallet` is one P-256 keypair. `WalletStore` keeps wallets by address
//! string and persists their secret scalars, hex encoded, to a JSON file.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use p256::ecdsa::SigningKey;
use rand_core::OsRng;
use tracing::info;

use crate::address::Address;
use crate::error::{ChainError, Result};
use crate::hashing::hash160;
use crate::transaction::raw_public_key;
use crate::types::{Hash160, PublicKey};

#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl Wallet {
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Rebuild a wallet from its 32-byte secret scalar.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self> {
        Ok(Self::from_signing_key(SigningKey::from_slice(secret)?))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = raw_public_key(&signing_key);
        Wallet { signing_key, public_key }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Raw x ‖ y public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn pubkey_hash(&self) -> Hash160 {
        hash160(&self.public_key)
    }

    pub fn address(&self, prefix: u8) -> Address {
        Address::derive(&self.public_key, prefix)
    }

    pub fn secret_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct WalletStore {
    path: Option<PathBuf>,
    wallets: BTreeMap<String, Wallet>,
}

impl WalletStore {
    /// Load wallets from `path`; a missing file yields an empty store that
    /// will be created on `save`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut wallets = BTreeMap::new();

        if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let secrets: BTreeMap<String, String> = serde_json::from_str(&raw)?;
            for (address, secret) in secrets {
                let bytes = hex::decode(&secret)
                    .map_err(|e| ChainError::Decode(format!("wallet {address}: {e}")))?;
                wallets.insert(address, Wallet::from_secret_bytes(&bytes)?);
            }
        }

        Ok(WalletStore { path: Some(path), wallets })
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Generate a keypair and return its address.
    pub fn create_wallet(&mut self, prefix: u8) -> Address {
        let wallet = Wallet::generate();
        let address = wallet.address(prefix);
        self.wallets.insert(address.encoded.clone(), wallet);
        address
    }

    pub fn wallet(&self, address: &str) -> Result<&Wallet> {
        self.wallets
            .get(address)
            .ok_or_else(|| ChainError::InvalidAddress(format!("{address}: no wallet holds this address")))
    }

    pub fn addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    /// Write every wallet back to the file this store was opened from.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let secrets: BTreeMap<&String, String> = self
            .wallets
            .iter()
            .map(|(address, wallet)| (address, hex::encode(wallet.secret_bytes())))
            .collect();
        fs::write(path, serde_json::to_string_pretty(&secrets)?)?;
        info!(wallets = secrets.len(), path = %path.display(), "wallets saved");
        Ok(())
    }
}
