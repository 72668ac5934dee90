//! Property tests

use proptest::prelude::*;
use utxo_ledger::hashing::{base58_decode, base58_encode, hash256};
use utxo_ledger::*;

proptest! {
    #[test]
    fn prop_address_round_trip(public_key in prop::collection::vec(any::<u8>(), 1..96), prefix in any::<u8>()) {
        let derived = Address::derive(&public_key, prefix);
        let parsed = Address::parse(&derived.encoded).unwrap();
        prop_assert!(parsed.is_valid());
        prop_assert_eq!(parsed, derived);
    }

    #[test]
    fn prop_corrupted_address_bytes_fail(public_key in prop::collection::vec(any::<u8>(), 1..64), index in 0usize..25, flip in 1u8..=255) {
        let derived = Address::derive(&public_key, ADDRESS_PREFIX);
        let mut raw = base58_decode(&derived.encoded).unwrap();
        raw[index] ^= flip;
        prop_assert!(Address::parse(&base58_encode(&raw)).is_err());
    }

    #[test]
    fn prop_hash256_deterministic(data in prop::collection::vec(any::<u8>(), 0..256)) {
        prop_assert_eq!(hash256(&data), hash256(&data));
    }

    #[test]
    fn prop_merkle_odd_equals_duplicated_last(items in prop::collection::vec(any::<u64>(), 1..40)) {
        let root = MerkleBuilder::build(items.clone()).unwrap().root_hash();
        prop_assert_eq!(root, MerkleBuilder::build(items.clone()).unwrap().root_hash());

        if items.len() % 2 == 1 {
            let mut padded = items.clone();
            padded.push(*items.last().unwrap());
            prop_assert_eq!(root, MerkleBuilder::build(padded).unwrap().root_hash());
        }
    }
}
