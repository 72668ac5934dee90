//! # UTXO Ledger
//!
//! A local, single-node UTXO blockchain engine.
//!
//! Blocks commit to their transactions with a Merkle root and are sealed by a
//! proof-of-work search over the header. Transactions spend earlier outputs
//! with P-256 ECDSA signatures and lock new outputs to a public-key hash.
//! The set of unspent outputs is kept as a derived index next to the blocks
//! and can be rebuilt from history at any time.
//!
//! ## Layout
//!
//! - `hashing`, `codec`: digests, Base58 and the canonical record encoding
//! - `address`, `transaction`: Base58Check addresses, signing and locking
//! - `merkle`, `pow`, `block`: commitment, mining and block assembly
//! - `storage`, `utxo`, `chain`: persistence, the UTXO index and the chain itself
//! - `factory`, `wallet`: building coinbase and transfer transactions
//!
//! ## Usage
//!
//! ```rust
//! use utxo_ledger::{BlockChain, ChainConfig, MemoryStore, Wallet, factory};
//!
//! let config = ChainConfig::with_difficulty(4);
//! let alice = Wallet::generate();
//! let bob = Wallet::generate();
//! let alice_addr = alice.address(config.address_prefix);
//! let bob_addr = bob.address(config.address_prefix);
//!
//! let mut chain = BlockChain::seed(MemoryStore::new(), &alice_addr, config).unwrap();
//! let transfer = factory::new_transfer(&chain, &alice, &bob_addr, 10).unwrap();
//! let reward = factory::new_coinbase(&alice_addr, 25).unwrap();
//! chain.add_block(vec![reward, transfer], &alice_addr).unwrap();
//!
//! assert_eq!(chain.utxos().balance(&bob_addr.pubkey_hash).unwrap(), 10);
//! assert_eq!(chain.utxos().balance(&alice_addr.pubkey_hash).unwrap(), 40);
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod hashing;
pub mod codec;
pub mod address;
pub mod transaction;
pub mod merkle;
pub mod pow;
pub mod block;
pub mod storage;
pub mod utxo;
pub mod chain;
pub mod factory;
pub mod wallet;
pub mod config;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{ChainError, Result};
pub use address::Address;
pub use chain::{BlockChain, ChainIter};
pub use config::ChainConfig;
pub use merkle::{MerkleBuilder, MerkleNode, MerkleTree};
pub use storage::{MemoryStore, SledStore, Store, StoreTxn, WriteBatch};
pub use utxo::UtxoIndex;
pub use wallet::{Wallet, WalletStore};
