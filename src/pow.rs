//! Proof of work: target derivation, nonce search and validation

use std::sync::atomic::{AtomicBool, Ordering};

use primitive_types::U256;
use tracing::debug;

use crate::codec;
use crate::constants::*;
use crate::error::{ChainError, Result};
use crate::hashing::hash256;
use crate::types::*;

/// Target: 1 << (256 - difficulty)
///
/// A header hash meets the target when, read as a big-endian unsigned
/// integer, it is strictly below it. Difficulty 0 would be 2^256, which
/// does not fit; every hash but the all-ones one passes then.
pub fn target(difficulty: u8) -> U256 {
    if difficulty == 0 {
        return U256::MAX;
    }
    U256::one() << (256 - difficulty as usize)
}

/// hash256 of the encoded header
pub fn header_hash(header: &BlockHeader) -> Result<Hash> {
    Ok(hash256(&codec::serialize(header)?))
}

pub fn meets_target(hash: &Hash, difficulty: u8) -> bool {
    U256::from_big_endian(hash) < target(difficulty)
}

/// Mint: BlockHeader → (nonce, hash)
///
/// 1. Start at nonce 0
/// 2. Hash the header carrying the candidate nonce
/// 3. Stop at the first hash below target(difficulty)
/// 4. Otherwise increment the nonce and retry, up to MAX_NONCE
pub fn mint(header: &BlockHeader) -> Result<(u64, Hash)> {
    mint_cancellable(header, &AtomicBool::new(false))
}

/// Same search as `mint`, abandoned with `MiningCancelled` once `cancel`
/// is set. The flag is checked before every nonce.
pub fn mint_cancellable(header: &BlockHeader, cancel: &AtomicBool) -> Result<(u64, Hash)> {
    let mut candidate = header.clone();
    let difficulty = header.pow.difficulty;

    for nonce in 0..=MAX_NONCE {
        if cancel.load(Ordering::Relaxed) {
            debug!(nonce, "mining cancelled");
            return Err(ChainError::MiningCancelled);
        }

        candidate.pow.nonce = nonce;
        let hash = header_hash(&candidate)?;
        if meets_target(&hash, difficulty) {
            debug!(nonce, difficulty, hash = %hex::encode(hash), "proof of work found");
            return Ok((nonce, hash));
        }
    }

    Err(ChainError::Internal(format!(
        "nonce space exhausted at difficulty {difficulty}"
    )))
}

/// Validate: BlockHeader → {true, false}
///
/// Recompute the hash for the stored nonce and check it is below target.
pub fn validate(header: &BlockHeader) -> Result<bool> {
    let hash = header_hash(header)?;
    Ok(meets_target(&hash, header.pow.difficulty))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(difficulty: u8) -> BlockHeader {
        BlockHeader {
            prev_hash: [3; 32],
            timestamp: 1_700_000_000,
            merkle_root: [9; 32],
            pow: ProofOfWork { difficulty, nonce: 0 },
            version: CODEC_VERSION,
        }
    }

    #[test]
    fn test_target_values() {
        assert_eq!(target(1), U256::one() << 255);
        assert_eq!(target(8), U256::one() << 248);
        assert_eq!(target(255), U256::from(2u8));
        assert_eq!(target(0), U256::MAX);
    }

    #[test]
    fn test_higher_difficulty_lowers_target() {
        assert!(target(10) < target(9));
    }

    #[test]
    fn test_meets_target_leading_zero_bits() {
        let mut hash = [0xffu8; 32];
        hash[0] = 0x00;
        assert!(meets_target(&hash, 8));
        assert!(!meets_target(&hash, 9));
        hash[1] = 0x7f;
        assert!(meets_target(&hash, 9));
    }

    #[test]
    fn test_mint_then_validate() {
        let mut h = header(8);
        let (nonce, hash) = mint(&h).unwrap();
        h.pow.nonce = nonce;

        assert_eq!(header_hash(&h).unwrap(), hash);
        assert_eq!(hash[0], 0);
        assert!(validate(&h).unwrap());
    }

    #[test]
    fn test_mint_returns_first_valid_nonce() {
        let mut h = header(6);
        let (nonce, _) = mint(&h).unwrap();
        for earlier in 0..nonce {
            h.pow.nonce = earlier;
            assert!(!validate(&h).unwrap());
        }
    }

    #[test]
    fn test_corrupted_header_fails() {
        let mut h = header(16);
        let (nonce, _) = mint(&h).unwrap();
        h.pow.nonce = nonce;
        h.merkle_root[0] ^= 0x01;
        assert!(!validate(&h).unwrap());
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = AtomicBool::new(true);
        let result = mint_cancellable(&header(200), &cancel);
        assert!(matches!(result, Err(ChainError::MiningCancelled)));
    }
}
