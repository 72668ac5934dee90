//! UTXO index
//!
//! Derived state kept under the `utxo-` key prefix: one entry per
//! transaction id listing that transaction's outputs not yet spent, each
//! tagged with its original output index.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use crate::chain::BlockChain;
use crate::codec;
use crate::constants::UTXO_PREFIX;
use crate::error::{ChainError, Result};
use crate::storage::{Store, StoreTxn};
use crate::types::*;

/// Output indices selected per transaction id
pub type Selection = BTreeMap<Hash, Vec<u32>>;

pub fn utxo_key(txn_id: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(UTXO_PREFIX.len() + txn_id.len());
    key.extend_from_slice(UTXO_PREFIX);
    key.extend_from_slice(txn_id);
    key
}

fn txn_id_from_key(key: &[u8]) -> Result<Hash> {
    key.strip_prefix(UTXO_PREFIX)
        .and_then(|id| Hash::try_from(id).ok())
        .ok_or_else(|| ChainError::Storage(format!("malformed utxo key {}", hex::encode(key))))
}

fn unspent_outputs(txn: &Transaction) -> UnspentOutputs {
    txn.outputs
        .iter()
        .enumerate()
        .map(|(index, output)| UnspentOutput { index: index as u32, output: output.clone() })
        .collect()
}

/// Query and maintenance view over a chain's UTXO namespace
pub struct UtxoIndex<'a, S: Store> {
    chain: &'a BlockChain<S>,
}

impl<'a, S: Store> UtxoIndex<'a, S> {
    pub fn new(chain: &'a BlockChain<S>) -> Self {
        UtxoIndex { chain }
    }

    /// AccumulateAll: BlockChain → (TxnId → UnspentOutputs)
    ///
    /// 1. Walk every block from head to genesis
    /// 2. Record each transaction's outputs and, for non-coinbase
    ///    transactions, every (ref_txn_id, out_index) its inputs spend
    /// 3. Keep the outputs never recorded as spent
    ///
    /// Spends are only filtered out once the walk is complete, so the
    /// result does not depend on visiting order.
    pub fn accumulate_all(&self) -> Result<BTreeMap<Hash, UnspentOutputs>> {
        let mut created: HashMap<Hash, UnspentOutputs> = HashMap::new();
        let mut spent: HashMap<Hash, HashSet<i64>> = HashMap::new();

        for block in self.chain.iter() {
            for txn in block?.transactions {
                if !txn.is_coinbase() {
                    for input in &txn.inputs {
                        spent.entry(input.ref_txn_id).or_default().insert(input.out_index);
                    }
                }
                created.insert(txn.id, unspent_outputs(&txn));
            }
        }

        let mut unspent = BTreeMap::new();
        for (id, outputs) in created {
            let remaining: UnspentOutputs = match spent.get(&id) {
                Some(indices) => outputs
                    .into_iter()
                    .filter(|u| !indices.contains(&i64::from(u.index)))
                    .collect(),
                None => outputs,
            };
            if !remaining.is_empty() {
                unspent.insert(id, remaining);
            }
        }
        Ok(unspent)
    }

    /// SelectSpendable: Hash160 × ℕ → ℕ × Selection
    ///
    /// Scan the index in key order and take every output locked to
    /// `pubkey_hash` while the running total is still below `amount`.
    /// Outputs are taken whole, so the total may overshoot by the value
    /// of the last one taken.
    pub fn select_spendable(&self, pubkey_hash: &Hash160, amount: u64) -> Result<(u64, Selection)> {
        let mut accumulated = 0u64;
        let mut selection = Selection::new();

        for (id, outputs) in self.entries()? {
            for unspent in outputs {
                if unspent.output.check_lock(pubkey_hash) && accumulated < amount {
                    accumulated = accumulated.saturating_add(unspent.output.value);
                    selection.entry(id).or_default().push(unspent.index);
                }
            }
        }
        Ok((accumulated, selection))
    }

    /// Every unspent output locked to `pubkey_hash`
    pub fn fetch_all(&self, pubkey_hash: &Hash160) -> Result<Vec<TxOutput>> {
        Ok(self
            .entries()?
            .into_iter()
            .flat_map(|(_, outputs)| outputs)
            .map(|unspent| unspent.output)
            .filter(|output| output.check_lock(pubkey_hash))
            .collect())
    }

    pub fn balance(&self, pubkey_hash: &Hash160) -> Result<u64> {
        self.fetch_all(pubkey_hash)?
            .iter()
            .try_fold(0u64, |total, o| total.checked_add(o.value))
            .ok_or_else(|| {
                ChainError::Internal(format!("balance of {} overflows", hex::encode(pubkey_hash)))
            })
    }

    /// Number of transactions with at least one unspent output
    pub fn count(&self) -> Result<usize> {
        Ok(self.chain.store().scan_prefix(UTXO_PREFIX)?.len())
    }

    /// Drop the whole namespace and rebuild it from chain history in one
    /// batch. Returns the number of entries written.
    pub fn reindex(&self) -> Result<usize> {
        let unspent = self.accumulate_all()?;

        let mut txn = StoreTxn::new(self.chain.store());
        for (key, _) in txn.scan_prefix(UTXO_PREFIX)? {
            txn.delete(key);
        }
        for (id, outputs) in &unspent {
            txn.set(utxo_key(id), codec::serialize(outputs)?);
        }
        txn.commit()?;

        info!(entries = unspent.len(), "utxo index rebuilt");
        Ok(unspent.len())
    }

    /// Check that `transactions`, applied in order, only spend outputs that
    /// exist and are unspent, and that no transfer pays out more than it
    /// spends. Outputs whose sum overflows are rejected. Nothing is written.
    pub fn check_spends(&self, transactions: &[Transaction]) -> Result<()> {
        let mut txn = StoreTxn::new(self.chain.store());
        for transaction in transactions {
            let spent = apply_transaction(&mut txn, transaction, ChainError::InvalidTransaction)?;
            if transaction.is_coinbase() {
                continue;
            }
            let paid = transaction.total_output().ok_or_else(|| {
                ChainError::InvalidTransaction(format!(
                    "{} has outputs that overflow",
                    hex::encode(transaction.id)
                ))
            })?;
            if transaction.inputs.is_empty() || spent < paid {
                return Err(ChainError::InvalidTransaction(format!(
                    "{} pays {paid} from inputs worth {spent}",
                    hex::encode(transaction.id)
                )));
            }
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(Hash, UnspentOutputs)>> {
        self.chain
            .store()
            .scan_prefix(UTXO_PREFIX)?
            .into_iter()
            .map(|(key, value)| -> Result<(Hash, UnspentOutputs)> {
                Ok((txn_id_from_key(&key)?, codec::deserialize(&value)?))
            })
            .collect()
    }
}

/// Incremental update for one block, staged in `txn`.
///
/// Inputs of non-coinbase transactions remove the outputs they spend
/// (deleting an entry once it is empty); each transaction's own outputs
/// become a new entry. A spend that is not in the index is an internal
/// error: the caller must not commit `txn`.
pub fn update_on_block<S: Store + ?Sized>(txn: &mut StoreTxn<'_, S>, block: &Block) -> Result<()> {
    for transaction in &block.transactions {
        apply_transaction(txn, transaction, ChainError::Internal)?;
    }
    debug!(height = block.height, transactions = block.transactions.len(), "utxo delta staged");
    Ok(())
}

fn apply_transaction<S: Store + ?Sized>(
    txn: &mut StoreTxn<'_, S>,
    transaction: &Transaction,
    missing: fn(String) -> ChainError,
) -> Result<u64> {
    let mut spent_value = 0u64;
    if !transaction.is_coinbase() {
        for input in &transaction.inputs {
            let key = utxo_key(&input.ref_txn_id);
            let spent = || {
                missing(format!(
                    "output {}:{} referenced by {} is missing or already spent",
                    hex::encode(input.ref_txn_id),
                    input.out_index,
                    hex::encode(transaction.id)
                ))
            };

            let bytes = txn.get(&key)?.ok_or_else(spent)?;
            let mut outputs: UnspentOutputs = codec::deserialize(&bytes)?;
            let position = outputs
                .iter()
                .position(|u| i64::from(u.index) == input.out_index)
                .ok_or_else(spent)?;
            let consumed = outputs.remove(position);
            spent_value = spent_value.saturating_add(consumed.output.value);

            if outputs.is_empty() {
                txn.delete(key);
            } else {
                txn.set(key, codec::serialize(&outputs)?);
            }
        }
    }

    let fresh = unspent_outputs(transaction);
    if !fresh.is_empty() {
        txn.set(utxo_key(&transaction.id), codec::serialize(&fresh)?);
    }
    Ok(spent_value)
}
