//! Chain engine configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{ChainError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading zero bits required of a block hash
    pub difficulty: u8,
    /// Value minted by each coinbase
    pub block_reward: u64,
    /// Version byte of generated addresses
    pub address_prefix: u8,
    pub data_dir: PathBuf,
    pub wallet_file: PathBuf,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            difficulty: DEFAULT_DIFFICULTY,
            block_reward: BLOCK_REWARD,
            address_prefix: ADDRESS_PREFIX,
            data_dir: PathBuf::from("./tmp/db"),
            wallet_file: PathBuf::from("./tmp/wallets.json"),
        }
    }
}

impl ChainConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            ChainError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: ChainConfig = serde_json::from_str(&raw).map_err(|e| {
            ChainError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty == 0 {
            return Err(ChainError::InvalidConfig(
                "difficulty must be at least 1".into(),
            ));
        }
        if self.block_reward == 0 {
            return Err(ChainError::InvalidConfig(
                "block reward must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Defaults with a given difficulty, mostly for tests
    pub fn with_difficulty(difficulty: u8) -> Self {
        ChainConfig { difficulty, ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ChainConfig::default();
        assert_eq!(config.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(config.block_reward, 25);
        assert_eq!(config.address_prefix, 0x00);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_difficulty_rejected() {
        let config = ChainConfig::with_difficulty(0);
        assert!(matches!(config.validate(), Err(ChainError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "difficulty": 12, "data_dir": "/var/lib/ledger" }}"#).unwrap();

        let config = ChainConfig::load(file.path()).unwrap();
        assert_eq!(config.difficulty, 12);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/ledger"));
        assert_eq!(config.block_reward, BLOCK_REWARD);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "difficulty = 12").unwrap();
        assert!(matches!(ChainConfig::load(file.path()), Err(ChainError::InvalidConfig(_))));
    }
}
