//! Transaction construction: coinbase rewards and signed transfers

use rand_core::{OsRng, RngCore};
use tracing::debug;

use crate::address::Address;
use crate::chain::BlockChain;
use crate::constants::*;
use crate::error::{ChainError, Result};
use crate::storage::Store;
use crate::types::*;
use crate::wallet::Wallet;

/// Reward transaction paying `reward` to `to`.
///
/// The single input carries random bytes in place of a public key so that
/// two coinbases for the same address and reward still get distinct ids.
pub fn new_coinbase(to: &Address, reward: u64) -> Result<Transaction> {
    let mut data = [0u8; COINBASE_DATA_LEN];
    OsRng.fill_bytes(&mut data);

    let input = TxInput {
        ref_txn_id: ZERO_HASH,
        out_index: COINBASE_OUT_INDEX,
        signature: Vec::new(),
        public_key: hex::encode(data).into_bytes(),
    };
    let output = TxOutput::new(reward, to)?;
    Transaction::new(vec![input], vec![output])
}

/// NewTransfer: BlockChain × Wallet × Address × ℕ → Transaction
///
/// 1. Select unspent outputs of the wallet's key covering `amount`
/// 2. Spend each of them with an input carrying the wallet's public key
/// 3. Pay `amount` to `to` and any excess back to the wallet
/// 4. Assign the id, then sign every input against chain history
pub fn new_transfer<S: Store>(
    chain: &BlockChain<S>,
    wallet: &Wallet,
    to: &Address,
    amount: u64,
) -> Result<Transaction> {
    if amount == 0 {
        return Err(ChainError::InvalidAmount("transfer amount must be positive".into()));
    }

    let from = wallet.address(chain.config().address_prefix);
    let (accumulated, selection) = chain.utxos().select_spendable(&from.pubkey_hash, amount)?;
    if accumulated < amount {
        return Err(ChainError::InsufficientFunds { needed: amount, available: accumulated });
    }

    let inputs = selection
        .iter()
        .flat_map(|(txn_id, indices)| {
            indices.iter().map(move |&index| TxInput {
                ref_txn_id: *txn_id,
                out_index: i64::from(index),
                signature: Vec::new(),
                public_key: wallet.public_key().clone(),
            })
        })
        .collect::<Vec<_>>();

    let mut outputs = vec![TxOutput::new(amount, to)?];
    if accumulated > amount {
        outputs.push(TxOutput::new(accumulated - amount, &from)?);
    }

    let mut txn = Transaction::new(inputs, outputs)?;
    chain.sign_transaction(&mut txn, wallet.signing_key())?;

    debug!(
        txn = %hex::encode(txn.id),
        from = %from,
        to = %to,
        amount,
        change = accumulated - amount,
        "transfer built"
    );
    Ok(txn)
}
