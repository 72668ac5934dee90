//! Core ledger types
//!
//! Field order of every record here is part of the canonical encoding and
//! therefore of every hash pre-image. Do not reorder.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Hash type: 256-bit digest
pub type Hash = [u8; 32];

/// 160-bit public-key hash
pub type Hash160 = [u8; 20];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Raw P-256 public key: x ‖ y, 32 bytes each
pub type PublicKey = Vec<u8>;

/// Transaction input: a reference to a prior output plus the spender's proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub ref_txn_id: Hash,
    pub out_index: i64,
    pub signature: ByteString,
    pub public_key: PublicKey,
}

/// Transaction output: a value locked to a public-key hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub pubkey_hash: Hash160,
}

/// Transaction: id = hash256(encode(self with id cleared))
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// Proof-of-work parameters of a header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWork {
    pub difficulty: u8,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub prev_hash: Hash,
    pub timestamp: i64,
    pub merkle_root: Hash,
    pub pow: ProofOfWork,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub height: u64,
    pub origin: Address,
    pub tx_count: u64,
    pub transactions: Vec<Transaction>,
    pub hash: Hash,
}

/// An unspent output together with its position in the creating transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub index: u32,
    pub output: TxOutput,
}

/// Persisted value of one UTXO-namespace key
pub type UnspentOutputs = Vec<UnspentOutput>;
