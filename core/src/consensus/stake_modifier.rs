//! Stake modifier derivation.
//!
//! The stake modifier is a 256-bit pseudorandom value mixed into every
//! PoBS lottery preimage. It is rederived for each candidate block from
//! a sliding window of the most recent block ids already on the
//! canonical chain, so it cannot be biased by the block currently being
//! proposed and both validators and proposers compute the same value
//! for a given parent.
//!
//! Each of its 256 bits is selected independently: bit `i` is drawn
//! from a block chosen out of the window by hashing the window's
//! aggregate seed together with `i`, then taking that block's own bit
//! `i`. This avoids giving any single block in the window disproportionate
//! influence over the whole modifier.

use crate::crypto;
use crate::encoding::Encode;
use crate::types::block::BlockId;
use crate::types::hash::{Hash, HASH_LEN};
use crate::types::index::BlockHeight;

use super::error::StorageError;
use super::store::StateStore;

/// Gathers the stake-modifier window for a block at `candidate_height`
/// extending `parent_id`: the `window_size` most recent canonical block
/// ids strictly before `candidate_height`, oldest first. Shared by the
/// validator (checking a submitted block's PoBS hash) and the block
/// creator (searching for a solving stake), so both compute the same
/// modifier for the same parent.
pub fn window_for_height(
    store: &dyn StateStore,
    window_size: u64,
    candidate_height: u64,
    parent_id: BlockId,
) -> Result<Vec<BlockId>, StorageError> {
    let window_size = window_size.max(1);
    let start_height = candidate_height.saturating_sub(window_size).max(1) - 1;
    let mut window = Vec::new();
    let mut height = BlockHeight(start_height);
    loop {
        if let Some(id) = store.block_id_at_height(height)? {
            window.push(id);
        }
        if height.0 + 1 > candidate_height.saturating_sub(1) || window.len() as u64 >= window_size {
            break;
        }
        height = height.succ();
    }
    if window.is_empty() {
        window.push(parent_id);
    }
    Ok(window)
}

/// Computes the stake modifier for a candidate block whose parent's
/// most recent ancestry (oldest first) is `window`. `window` must be
/// non-empty; the genesis block alone is a valid one-element window.
pub fn compute_stake_modifier(window: &[BlockId]) -> Hash {
    assert!(!window.is_empty(), "stake modifier window must not be empty");

    let seed = {
        let mut buf = Vec::new();
        for id in window {
            id.encode(&mut buf);
        }
        crypto::hash(&buf)
    };

    let mut bits = [0u8; HASH_LEN];
    for i in 0..(HASH_LEN * 8) {
        let mut preimage = Vec::with_capacity(HASH_LEN + 8);
        preimage.extend_from_slice(&seed.0);
        preimage.extend_from_slice(&(i as u64).to_le_bytes());
        let selector = crypto::hash(&preimage);
        let selector_int = u64::from_le_bytes(selector.0[0..8].try_into().unwrap());
        let chosen = &window[selector_int as usize % window.len()];

        let byte_idx = i / 8;
        let bit_idx = i % 8;
        let bit = (chosen.0.0[byte_idx] >> bit_idx) & 1;
        if bit == 1 {
            bits[byte_idx] |= 1 << bit_idx;
        }
    }
    Hash(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(bytes: &[u8]) -> Vec<BlockId> {
        bytes.iter().map(|&b| BlockId(Hash([b; HASH_LEN]))).collect()
    }

    #[test]
    fn is_deterministic_for_the_same_window() {
        let window = ids(&[1, 2, 3, 4]);
        assert_eq!(compute_stake_modifier(&window), compute_stake_modifier(&window));
    }

    #[test]
    fn changes_when_the_window_changes() {
        let a = compute_stake_modifier(&ids(&[1, 2, 3]));
        let b = compute_stake_modifier(&ids(&[1, 2, 4]));
        assert_ne!(a, b);
    }

    #[test]
    fn single_block_window_is_valid() {
        let window = ids(&[7]);
        let modifier = compute_stake_modifier(&window);
        assert_ne!(modifier, Hash::ZERO);
    }
}
