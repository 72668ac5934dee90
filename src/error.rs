//! Error types for the chain engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Blockchain already exists")]
    AlreadyExists,

    #[error("Blockchain does not exist")]
    NotFound,

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Cannot build a merkle tree from zero items")]
    EmptyMerkleTree,

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Mining was cancelled")]
    MiningCancelled,

    #[error("Internal invariant violated: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChainError {
    /// True for failures that leave the chain or its index in a state the
    /// engine cannot repair locally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChainError::Internal(_) | ChainError::Storage(_) | ChainError::Serialization(_)
        )
    }
}

impl From<sled::Error> for ChainError {
    fn from(err: sled::Error) -> Self {
        ChainError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for ChainError {
    fn from(err: bincode::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(format!("json: {err}"))
    }
}

impl From<p256::ecdsa::Error> for ChainError {
    fn from(err: p256::ecdsa::Error) -> Self {
        ChainError::Crypto(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
