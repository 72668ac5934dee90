//! Transactions: identity, signing domain and output locking

use std::collections::HashMap;
use std::fmt;

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::{EncodedPoint, FieldBytes};
use tracing::warn;

use crate::address::Address;
use crate::codec;
use crate::constants::*;
use crate::error::{ChainError, Result};
use crate::hashing::{base58_decode, hash160, hash256};
use crate::types::*;

impl TxInput {
    /// Does `hash160(public_key)` match `pubkey_hash`?
    pub fn check_key(&self, pubkey_hash: &Hash160) -> bool {
        &hash160(&self.public_key) == pubkey_hash
    }
}

impl TxOutput {
    /// Build an output of `value` locked to `address`.
    pub fn new(value: u64, address: &Address) -> Result<Self> {
        let mut output = TxOutput { value, pubkey_hash: [0u8; 20] };
        output.lock(address)?;
        Ok(output)
    }

    /// Lock the output to the public-key hash carried by `address`:
    /// base58-decode, drop the version prefix and the trailing checksum.
    pub fn lock(&mut self, address: &Address) -> Result<()> {
        let full = base58_decode(&address.encoded)?;
        if full.len() != 25 {
            return Err(ChainError::InvalidAddress(format!(
                "{}: cannot lock to a {}-byte payload",
                address.encoded,
                full.len()
            )));
        }
        self.pubkey_hash.copy_from_slice(&full[1..full.len() - 4]);
        Ok(())
    }

    pub fn check_lock(&self, pubkey_hash: &Hash160) -> bool {
        &self.pubkey_hash == pubkey_hash
    }
}

impl Transaction {
    /// Build a transaction and assign its id.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self> {
        let mut txn = Transaction { id: ZERO_HASH, inputs, outputs };
        txn.id = txn.compute_id()?;
        Ok(txn)
    }

    /// Exactly one input, with an empty reference and the -1 sentinel index.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].ref_txn_id == ZERO_HASH
            && self.inputs[0].out_index == COINBASE_OUT_INDEX
    }

    /// hash256 of the encoded transaction with its id cleared
    pub fn compute_id(&self) -> Result<Hash> {
        let mut copy = self.clone();
        copy.id = ZERO_HASH;
        Ok(hash256(&codec::serialize(&copy)?))
    }

    /// Copy with signature and public key stripped from every input.
    pub fn safe_copy(&self) -> Transaction {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput {
                ref_txn_id: input.ref_txn_id,
                out_index: input.out_index,
                signature: Vec::new(),
                public_key: Vec::new(),
            })
            .collect();

        Transaction { id: self.id, inputs, outputs: self.outputs.clone() }
    }

    /// Message signed for input `index`: the id of the safe copy in which
    /// only that input carries the locking hash of the output it spends.
    ///
    /// Signing and verification both go through here.
    pub fn signature_hash(&self, index: usize, locking_hash: &Hash160) -> Result<Hash> {
        let mut copy = self.safe_copy();
        let input = copy.inputs.get_mut(index).ok_or_else(|| {
            ChainError::Internal(format!("input {index} out of range for {}", hex::encode(self.id)))
        })?;
        input.public_key = locking_hash.to_vec();
        copy.id = copy.compute_id()?;
        Ok(copy.id)
    }

    /// Sign every input with `key`. Coinbase transactions are left untouched.
    ///
    /// `resolver` maps a referenced transaction id to that transaction; an
    /// input it cannot resolve is an internal error.
    pub fn sign<F>(&mut self, key: &SigningKey, mut resolver: F) -> Result<()>
    where
        F: FnMut(&Hash) -> Result<Transaction>,
    {
        if self.is_coinbase() {
            return Ok(());
        }

        let mut prior = HashMap::new();
        for index in 0..self.inputs.len() {
            let lock = self.resolve_lock(index, &mut prior, &mut resolver)?;
            let message = self.signature_hash(index, &lock)?;
            let signature: Signature = key.sign_prehash(&message)?;
            self.inputs[index].signature = signature.to_bytes().to_vec();
        }
        Ok(())
    }

    /// Verify every input's signature, in input order. Stops at the first
    /// failing input without resolving the ones after it.
    pub fn verify<F>(&self, mut resolver: F) -> Result<bool>
    where
        F: FnMut(&Hash) -> Result<Transaction>,
    {
        if self.is_coinbase() {
            return Ok(true);
        }

        let mut prior = HashMap::new();
        for (index, input) in self.inputs.iter().enumerate() {
            let lock = self.resolve_lock(index, &mut prior, &mut resolver)?;
            if !input.check_key(&lock) {
                warn!(txn = %hex::encode(self.id), index, "input key does not own the spent output");
                return Ok(false);
            }

            let message = self.signature_hash(index, &lock)?;
            if !verify_raw(&input.public_key, &input.signature, &message) {
                warn!(txn = %hex::encode(self.id), index, "signature verification failed");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Locking hash of the output spent by input `index`. Resolved
    /// transactions are cached in `prior`.
    fn resolve_lock<F>(
        &self,
        index: usize,
        prior: &mut HashMap<Hash, Transaction>,
        resolver: &mut F,
    ) -> Result<Hash160>
    where
        F: FnMut(&Hash) -> Result<Transaction>,
    {
        let input = &self.inputs[index];
        if !prior.contains_key(&input.ref_txn_id) {
            let txn = resolver(&input.ref_txn_id).map_err(|e| {
                ChainError::Internal(format!(
                    "cannot resolve input {}:{} of {}: {e}",
                    hex::encode(input.ref_txn_id),
                    input.out_index,
                    hex::encode(self.id)
                ))
            })?;
            prior.insert(input.ref_txn_id, txn);
        }

        usize::try_from(input.out_index)
            .ok()
            .and_then(|i| prior.get(&input.ref_txn_id)?.outputs.get(i))
            .map(|output| output.pubkey_hash)
            .ok_or_else(|| {
                ChainError::Internal(format!(
                    "output {} does not exist in {}",
                    input.out_index,
                    hex::encode(input.ref_txn_id)
                ))
            })
    }

    /// Sum of output values, `None` if it overflows `u64`.
    pub fn total_output(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |total, o| total.checked_add(o.value))
    }
}

/// Raw P-256 public key (x ‖ y) of a signing key
pub fn raw_public_key(key: &SigningKey) -> PublicKey {
    let point = key.verifying_key().to_encoded_point(false);
    // drop the SEC1 0x04 tag
    point.as_bytes()[1..].to_vec()
}

/// Split `public_key` into (x, y) and `signature` into (r, s) at their
/// midpoints and check the signature over `message`.
fn verify_raw(public_key: &[u8], signature: &[u8], message: &Hash) -> bool {
    if public_key.len() != PUBLIC_KEY_LEN || signature.len() != SIGNATURE_LEN {
        return false;
    }

    let (x, y) = public_key.split_at(public_key.len() / 2);
    let point = EncodedPoint::from_affine_coordinates(
        FieldBytes::from_slice(x),
        FieldBytes::from_slice(y),
        false,
    );
    let Ok(verifying_key) = VerifyingKey::from_encoded_point(&point) else {
        return false;
    };

    let (r, s) = signature.split_at(signature.len() / 2);
    let Ok(signature) = Signature::from_scalars(
        FieldBytes::clone_from_slice(r),
        FieldBytes::clone_from_slice(s),
    ) else {
        return false;
    };

    verifying_key.verify_prehash(message, &signature).is_ok()
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Transaction {}:", hex::encode(self.id))?;
        for (i, input) in self.inputs.iter().enumerate() {
            writeln!(f, "     Input {i}:")?;
            writeln!(f, "       TxnID:     {}", hex::encode(input.ref_txn_id))?;
            writeln!(f, "       Out:       {}", input.out_index)?;
            writeln!(f, "       Signature: {}", hex::encode(&input.signature))?;
            writeln!(f, "       PubKey:    {}", hex::encode(&input.public_key))?;
        }
        for (i, output) in self.outputs.iter().enumerate() {
            writeln!(f, "     Output {i}:")?;
            writeln!(f, "       Value:  {}", output.value)?;
            writeln!(f, "       Lock:   {}", hex::encode(output.pubkey_hash))?;
        }
        write!(f, "---")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn keypair() -> (SigningKey, PublicKey) {
        let key = SigningKey::random(&mut OsRng);
        let public = raw_public_key(&key);
        (key, public)
    }

    fn funding(owner: &PublicKey) -> Transaction {
        let addr = Address::derive(owner, ADDRESS_PREFIX);
        let input = TxInput {
            ref_txn_id: ZERO_HASH,
            out_index: COINBASE_OUT_INDEX,
            signature: vec![],
            public_key: b"funding".to_vec(),
        };
        Transaction::new(vec![input], vec![TxOutput::new(25, &addr).unwrap()]).unwrap()
    }

    fn spend(prior: &Transaction, spender: &PublicKey, to: &Address) -> Transaction {
        let input = TxInput {
            ref_txn_id: prior.id,
            out_index: 0,
            signature: vec![],
            public_key: spender.clone(),
        };
        Transaction::new(vec![input], vec![TxOutput::new(25, to).unwrap()]).unwrap()
    }

    fn resolver(prior: &Transaction) -> impl FnMut(&Hash) -> Result<Transaction> + '_ {
        move |id| {
            if *id == prior.id {
                Ok(prior.clone())
            } else {
                Err(ChainError::TransactionNotFound(hex::encode(id)))
            }
        }
    }

    #[test]
    fn test_is_coinbase() {
        let (_, public) = keypair();
        let coinbase = funding(&public);
        assert!(coinbase.is_coinbase());

        let to = Address::derive(b"to", ADDRESS_PREFIX);
        assert!(!spend(&coinbase, &public, &to).is_coinbase());
    }

    #[test]
    fn test_id_is_stable_and_sensitive() {
        let (_, public) = keypair();
        let txn = funding(&public);
        assert_eq!(txn.compute_id().unwrap(), txn.id);
        assert_eq!(txn.compute_id().unwrap(), txn.compute_id().unwrap());

        let mut changed = txn.clone();
        changed.outputs[0].value += 1;
        assert_ne!(changed.compute_id().unwrap(), txn.id);

        let mut changed = txn.clone();
        changed.inputs[0].public_key[0] ^= 1;
        assert_ne!(changed.compute_id().unwrap(), txn.id);
    }

    #[test]
    fn test_safe_copy_strips_inputs_only() {
        let (key, public) = keypair();
        let prior = funding(&public);
        let to = Address::derive(b"to", ADDRESS_PREFIX);
        let mut txn = spend(&prior, &public, &to);
        txn.sign(&key, resolver(&prior)).unwrap();

        let copy = txn.safe_copy();
        assert!(copy.inputs.iter().all(|i| i.signature.is_empty() && i.public_key.is_empty()));
        assert_eq!(copy.inputs[0].ref_txn_id, txn.inputs[0].ref_txn_id);
        assert_eq!(copy.outputs, txn.outputs);
        assert_eq!(copy.id, txn.id);
    }

    #[test]
    fn test_sign_then_verify() {
        let (key, public) = keypair();
        let prior = funding(&public);
        let to = Address::derive(b"to", ADDRESS_PREFIX);
        let mut txn = spend(&prior, &public, &to);

        txn.sign(&key, resolver(&prior)).unwrap();
        assert_eq!(txn.inputs[0].signature.len(), SIGNATURE_LEN);
        assert!(txn.verify(resolver(&prior)).unwrap());
    }

    #[test]
    fn test_flipped_signature_bit_fails() {
        let (key, public) = keypair();
        let prior = funding(&public);
        let to = Address::derive(b"to", ADDRESS_PREFIX);
        let mut txn = spend(&prior, &public, &to);
        txn.sign(&key, resolver(&prior)).unwrap();

        txn.inputs[0].signature[10] ^= 0x01;
        assert!(!txn.verify(resolver(&prior)).unwrap());
    }

    #[test]
    fn test_other_key_fails() {
        let (owner_key, owner_public) = keypair();
        let (thief_key, thief_public) = keypair();
        let prior = funding(&owner_public);
        let to = Address::derive(b"to", ADDRESS_PREFIX);

        // thief signs with its own key and attaches its own public key
        let mut stolen = spend(&prior, &thief_public, &to);
        stolen.sign(&thief_key, resolver(&prior)).unwrap();
        assert!(!stolen.verify(resolver(&prior)).unwrap());

        // owner's key attached, thief's signature
        let mut forged = spend(&prior, &owner_public, &to);
        forged.sign(&thief_key, resolver(&prior)).unwrap();
        assert!(!forged.verify(resolver(&prior)).unwrap());

        let mut honest = spend(&prior, &owner_public, &to);
        honest.sign(&owner_key, resolver(&prior)).unwrap();
        assert!(honest.verify(resolver(&prior)).unwrap());
    }

    #[test]
    fn test_tampered_output_fails() {
        let (key, public) = keypair();
        let prior = funding(&public);
        let to = Address::derive(b"to", ADDRESS_PREFIX);
        let mut txn = spend(&prior, &public, &to);
        txn.sign(&key, resolver(&prior)).unwrap();

        txn.outputs[0].value = 1_000;
        assert!(!txn.verify(resolver(&prior)).unwrap());
    }

    #[test]
    fn test_coinbase_skips_resolver() {
        let (key, public) = keypair();
        let mut coinbase = funding(&public);
        let mut calls = 0;
        let mut counting = |_: &Hash| -> Result<Transaction> {
            calls += 1;
            Err(ChainError::NotFound)
        };

        coinbase.sign(&key, &mut counting).unwrap();
        assert!(coinbase.verify(&mut counting).unwrap());
        assert_eq!(calls, 0);
        assert!(coinbase.inputs[0].signature.is_empty());
    }

    #[test]
    fn test_unresolvable_input_is_internal() {
        let (key, public) = keypair();
        let prior = funding(&public);
        let to = Address::derive(b"to", ADDRESS_PREFIX);
        let mut txn = spend(&prior, &public, &to);

        let missing = |id: &Hash| -> Result<Transaction> {
            Err(ChainError::TransactionNotFound(hex::encode(id)))
        };
        let err = txn.sign(&key, missing).unwrap_err();
        assert!(matches!(err, ChainError::Internal(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_signature_hash_differs_per_lock() {
        let (_, public) = keypair();
        let prior = funding(&public);
        let to = Address::derive(b"to", ADDRESS_PREFIX);
        let txn = spend(&prior, &public, &to);

        let a = txn.signature_hash(0, &[1; 20]).unwrap();
        let b = txn.signature_hash(0, &[2; 20]).unwrap();
        assert_ne!(a, b);
        assert!(txn.signature_hash(3, &[1; 20]).is_err());
    }

    #[test]
    fn test_total_output_overflow_is_none() {
        let to = Address::derive(b"to", ADDRESS_PREFIX);
        let outputs = vec![TxOutput::new(u64::MAX, &to).unwrap(), TxOutput::new(26, &to).unwrap()];
        let txn = Transaction::new(vec![], outputs).unwrap();
        assert_eq!(txn.total_output(), None);

        let (_, public) = keypair();
        assert_eq!(funding(&public).total_output(), Some(25));
    }

    #[test]
    fn test_verify_stops_before_unresolvable_input() {
        let (key, public) = keypair();
        let (_, stranger) = keypair();
        let prior = funding(&public);
        let unknown = funding(&stranger);
        let to = Address::derive(b"to", ADDRESS_PREFIX);

        let mut txn = spend(&prior, &public, &to);
        txn.inputs.push(TxInput {
            ref_txn_id: unknown.id,
            out_index: 0,
            signature: vec![],
            public_key: public.clone(),
        });
        let both = |id: &Hash| -> Result<Transaction> {
            [&prior, &unknown]
                .into_iter()
                .find(|t| t.id == *id)
                .cloned()
                .ok_or_else(|| ChainError::TransactionNotFound(hex::encode(id)))
        };
        txn.sign(&key, both).unwrap();

        // input 0 fails before input 1 is ever looked up
        txn.inputs[0].signature[5] ^= 0x01;
        assert!(!txn.verify(resolver(&prior)).unwrap());

        // with input 0 intact the lookup of input 1 is reached and is fatal
        txn.inputs[0].signature[5] ^= 0x01;
        let err = txn.verify(resolver(&prior)).unwrap_err();
        assert!(matches!(err, ChainError::Internal(_)));
    }

    #[test]
    fn test_lock_and_check() {
        let addr = Address::derive(b"recipient", ADDRESS_PREFIX);
        let output = TxOutput::new(10, &addr).unwrap();
        assert!(output.check_lock(&addr.pubkey_hash));
        assert!(!output.check_lock(&[0; 20]));

        let input = TxInput {
            ref_txn_id: ZERO_HASH,
            out_index: 0,
            signature: vec![],
            public_key: b"recipient".to_vec(),
        };
        assert!(input.check_key(&addr.pubkey_hash));
    }

    #[test]
    fn test_raw_public_key_is_fixed_width() {
        for _ in 0..8 {
            let (_, public) = keypair();
            assert_eq!(public.len(), PUBLIC_KEY_LEN);
        }
    }
}
