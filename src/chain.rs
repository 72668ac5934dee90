//! The local append-only chain
//!
//! Blocks are stored under their hash, next to the `chainhead` and
//! `chainheight` keys and the UTXO namespace. Every append writes the block,
//! the new head, the new height and the UTXO delta in a single batch.

use p256::ecdsa::SigningKey;
use tracing::{info, warn};

use crate::address::Address;
use crate::codec;
use crate::config::ChainConfig;
use crate::constants::*;
use crate::error::{ChainError, Result};
use crate::merkle::MerkleBuilder;
use crate::storage::{Store, StoreTxn};
use crate::types::*;
use crate::utxo::{self, UtxoIndex};

pub struct BlockChain<S: Store> {
    store: S,
    head: Hash,
    height: u64,
    config: ChainConfig,
}

impl<S: Store> BlockChain<S> {
    /// Create a chain whose genesis block pays the reward to `origin`.
    ///
    /// Fails with `AlreadyExists` if `store` already holds a chain.
    pub fn seed(store: S, origin: &Address, config: ChainConfig) -> Result<Self> {
        config.validate()?;
        if store.get(CHAIN_HEAD_KEY)?.is_some() {
            return Err(ChainError::AlreadyExists);
        }

        let genesis = Block::genesis(origin, config.block_reward, config.difficulty)?;

        let mut txn = StoreTxn::new(&store);
        txn.set(genesis.hash.to_vec(), codec::serialize(&genesis)?);
        txn.set(CHAIN_HEAD_KEY, genesis.hash.to_vec());
        txn.set(CHAIN_HEIGHT_KEY, codec::encode_height(1).to_vec());
        utxo::update_on_block(&mut txn, &genesis)?;
        txn.commit()?;

        info!(head = %hex::encode(genesis.hash), origin = %origin, "chain seeded");
        Ok(BlockChain { store, head: genesis.hash, height: 1, config })
    }

    /// Load an existing chain. Fails with `NotFound` if `store` holds none.
    pub fn open(store: S, config: ChainConfig) -> Result<Self> {
        config.validate()?;
        let head = store.get(CHAIN_HEAD_KEY)?.ok_or(ChainError::NotFound)?;
        let head: Hash = head.as_slice().try_into().map_err(|_| {
            ChainError::Serialization(format!("chain head has {} bytes", head.len()))
        })?;
        let height = store
            .get(CHAIN_HEIGHT_KEY)?
            .ok_or_else(|| ChainError::Storage("chain head present without a height".into()))?;
        let height = codec::decode_height(&height)?;

        Ok(BlockChain { store, head, height, config })
    }

    /// AddBlock: [Transaction] × Address → Block
    ///
    /// 1. Reject an empty list, invalid signatures and unavailable spends
    /// 2. Commit to the transactions with a merkle tree
    /// 3. Mint a block on top of the current head at the current height
    /// 4. Persist block, head, height and UTXO delta atomically
    pub fn add_block(&mut self, transactions: Vec<Transaction>, origin: &Address) -> Result<Block> {
        if transactions.is_empty() {
            return Err(ChainError::EmptyMerkleTree);
        }
        for txn in transactions.iter().filter(|t| !t.is_coinbase()) {
            if !self.verify_transaction(txn)? {
                return Err(ChainError::InvalidTransaction(format!(
                    "{}: signature verification failed",
                    hex::encode(txn.id)
                )));
            }
        }
        self.utxos().check_spends(&transactions)?;

        let tree = MerkleBuilder::build(transactions)?;
        let block = Block::mint(self.head, tree, origin.clone(), self.height, self.config.difficulty)?;

        let mut txn = StoreTxn::new(&self.store);
        txn.set(block.hash.to_vec(), codec::serialize(&block)?);
        txn.set(CHAIN_HEAD_KEY, block.hash.to_vec());
        txn.set(CHAIN_HEIGHT_KEY, codec::encode_height(self.height + 1).to_vec());
        utxo::update_on_block(&mut txn, &block)?;
        txn.commit()?;

        self.head = block.hash;
        self.height += 1;
        info!(
            height = block.height,
            hash = %hex::encode(block.hash),
            transactions = block.tx_count,
            nonce = block.header.pow.nonce,
            "block added"
        );
        Ok(block)
    }

    /// Blocks from head back to genesis
    pub fn iter(&self) -> ChainIter<'_, S> {
        ChainIter { store: &self.store, cursor: Some(self.head) }
    }

    pub fn block(&self, hash: &Hash) -> Result<Block> {
        load_block(&self.store, hash)
    }

    /// Linear scan from head to genesis
    pub fn find_transaction(&self, id: &Hash) -> Result<Transaction> {
        for block in self.iter() {
            if let Some(txn) = block?.transactions.into_iter().find(|t| t.id == *id) {
                return Ok(txn);
            }
        }
        Err(ChainError::TransactionNotFound(hex::encode(id)))
    }

    pub fn sign_transaction(&self, txn: &mut Transaction, key: &SigningKey) -> Result<()> {
        txn.sign(key, |id| self.find_transaction(id))
    }

    pub fn verify_transaction(&self, txn: &Transaction) -> Result<bool> {
        let verified = txn.verify(|id| self.find_transaction(id))?;
        if !verified {
            warn!(txn = %hex::encode(txn.id), "transaction rejected");
        }
        Ok(verified)
    }

    pub fn utxos(&self) -> UtxoIndex<'_, S> {
        UtxoIndex::new(self)
    }

    pub fn head(&self) -> Hash {
        self.head
    }

    /// Number of blocks, genesis included
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Flush and release the store.
    pub fn close(self) -> Result<()> {
        self.store.flush()?;
        info!(height = self.height, "chain closed");
        Ok(())
    }
}

fn load_block<S: Store + ?Sized>(store: &S, hash: &Hash) -> Result<Block> {
    let bytes = store
        .get(hash)?
        .ok_or_else(|| ChainError::Storage(format!("block {} is missing", hex::encode(hash))))?;
    codec::deserialize(&bytes)
}

/// Backward walk over the chain. Ends after the genesis block; a storage
/// error is yielded once and ends the walk.
pub struct ChainIter<'a, S: Store> {
    store: &'a S,
    cursor: Option<Hash>,
}

impl<S: Store> Iterator for ChainIter<'_, S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.cursor.take()?;
        let block = match load_block(self.store, &hash) {
            Ok(block) => block,
            Err(e) => return Some(Err(e)),
        };
        if !block.is_genesis() {
            self.cursor = Some(block.header.prev_hash);
        }
        Some(Ok(block))
    }
}
