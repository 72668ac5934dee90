//! Chain engine constants

use crate::types::Hash;

/// Reward minted by every coinbase transaction
pub const BLOCK_REWARD: u64 = 25;

/// Default proof-of-work difficulty (leading zero bits of the target)
pub const DEFAULT_DIFFICULTY: u8 = 16;

/// Version byte prepended to public-key hashes in addresses
pub const ADDRESS_PREFIX: u8 = 0x00;

/// Version of the canonical record encoding, carried in every block header
pub const CODEC_VERSION: u32 = 1;

/// The all-zero hash: genesis `prev_hash` and coinbase `ref_txn_id`
pub const ZERO_HASH: Hash = [0u8; 32];

/// Output index carried by the single coinbase input
pub const COINBASE_OUT_INDEX: i64 = -1;

/// Random bytes embedded in a coinbase input so coinbase ids never collide
pub const COINBASE_DATA_LEN: usize = 24;

/// Practical ceiling of the nonce search
pub const MAX_NONCE: u64 = u64::MAX;

/// Bound of the merkle builder's producer/consumer queue
pub const MERKLE_QUEUE_CAPACITY: usize = 64;

/// Storage key of the chain head hash
pub const CHAIN_HEAD_KEY: &[u8] = b"chainhead";

/// Storage key of the chain height (number of blocks)
pub const CHAIN_HEIGHT_KEY: &[u8] = b"chainheight";

/// Reserved prefix of the UTXO namespace
pub const UTXO_PREFIX: &[u8] = b"utxo-";

/// Length of a raw P-256 public key (x ‖ y)
pub const PUBLIC_KEY_LEN: usize = 64;

/// Length of a raw ECDSA signature (r ‖ s)
pub const SIGNATURE_LEN: usize = 64;
