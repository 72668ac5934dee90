//! Block assembly, minting and self-checks

use std::sync::atomic::AtomicBool;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::address::Address;
use crate::constants::*;
use crate::error::{ChainError, Result};
use crate::factory;
use crate::merkle::{MerkleBuilder, MerkleTree};
use crate::pow;
use crate::types::*;

impl Block {
    /// Mint: Hash × MerkleTree × Address × ℕ × Difficulty → Block
    ///
    /// 1. Assemble a header over `prev_hash` and the tree's root
    /// 2. Search a nonce whose header hash is below target
    /// 3. Record the winning nonce and hash
    pub fn mint(
        prev_hash: Hash,
        tree: MerkleTree<Transaction>,
        origin: Address,
        height: u64,
        difficulty: u8,
    ) -> Result<Block> {
        Self::mint_cancellable(prev_hash, tree, origin, height, difficulty, &AtomicBool::new(false))
    }

    pub fn mint_cancellable(
        prev_hash: Hash,
        tree: MerkleTree<Transaction>,
        origin: Address,
        height: u64,
        difficulty: u8,
        cancel: &AtomicBool,
    ) -> Result<Block> {
        let mut header = BlockHeader {
            prev_hash,
            timestamp: unix_now()?,
            merkle_root: tree.root_hash(),
            pow: ProofOfWork { difficulty, nonce: 0 },
            version: CODEC_VERSION,
        };

        let (nonce, hash) = pow::mint_cancellable(&header, cancel)?;
        header.pow.nonce = nonce;

        let transactions = tree.into_items();
        Ok(Block {
            header,
            height,
            origin,
            tx_count: transactions.len() as u64,
            transactions,
            hash,
        })
    }

    /// Height-0 block holding a single coinbase paying `reward` to `origin`.
    pub fn genesis(origin: &Address, reward: u64, difficulty: u8) -> Result<Block> {
        let coinbase = factory::new_coinbase(origin, reward)?;
        let tree = MerkleBuilder::build(vec![coinbase])?;
        let block = Self::mint(ZERO_HASH, tree, origin.clone(), 0, difficulty)?;
        info!(hash = %hex::encode(block.hash), origin = %origin, "genesis block minted");
        Ok(block)
    }

    /// The stored nonce still satisfies the target and `hash` is the header's hash.
    pub fn validate(&self) -> Result<bool> {
        Ok(pow::validate(&self.header)? && pow::header_hash(&self.header)? == self.hash)
    }

    /// Recompute the merkle root over `transactions` and compare it with the header.
    pub fn check_merkle_root(&self) -> Result<bool> {
        if self.transactions.is_empty() || self.tx_count != self.transactions.len() as u64 {
            return Ok(false);
        }
        let tree = MerkleBuilder::build(self.transactions.clone())?;
        Ok(tree.root_hash() == self.header.merkle_root)
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 || self.header.prev_hash == ZERO_HASH
    }
}

fn unix_now() -> Result<i64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ChainError::Internal(format!("system clock before unix epoch: {e}")))?;
    Ok(elapsed.as_secs() as i64)
}
