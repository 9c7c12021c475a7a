//! Difficulty retargeting.
//!
//! `child_target = clamp(parent_target * actual_window / expected_window,
//! parent_target / F, parent_target * F)`, where `F` is the configured
//! maximum per-retarget adjustment factor. Clamping keeps one
//! anomalously fast or slow window from swinging the target by more
//! than a bounded multiple in a single step.

use num_bigint::BigUint;

use crate::types::block::BlockId;
use crate::types::hash::Target;
use crate::types::index::BlockHeight;

use super::config::ConsensusConfig;
use super::error::{ConsensusError, StorageError};
use super::store::StateStore;

/// The number of seconds a full retarget window is expected to take if
/// blocks are produced exactly on the target cadence.
pub fn expected_window_secs(cfg: &ConsensusConfig) -> u64 {
    cfg.target_window_size * cfg.target_block_time_secs
}

/// Computes the next block's target given the parent's target and the
/// actual wall-clock time the last `target_window_size` blocks took.
pub fn child_target(cfg: &ConsensusConfig, parent_target: Target, actual_window_secs: u64) -> Target {
    let parent = parent_target.to_biguint();
    let actual = BigUint::from(actual_window_secs.max(1));
    let expected = BigUint::from(expected_window_secs(cfg).max(1));

    let raw = (&parent * &actual) / &expected;

    let factor = BigUint::from(cfg.max_adjustment_factor.max(1));
    let min = &parent / &factor;
    let max = &parent * &factor;

    let clamped = raw.clamp(min, max);
    Target::from_biguint(&clamped)
}

/// Computes the target a block extending `parent_id` must solve,
/// reading whatever retarget-window history it needs from `store`.
/// Before a full window of history has accumulated, the genesis target
/// holds.
pub fn target_for_child(
    cfg: &ConsensusConfig,
    store: &dyn StateStore,
    parent_id: BlockId,
) -> Result<Target, ConsensusError> {
    let parent_index = store
        .block_index(&parent_id)?
        .ok_or_else(|| StorageError::Corruption(format!("missing block index for parent {parent_id}")))?;

    let window_size = cfg.target_window_size;
    if parent_index.height.0 + 1 < window_size {
        return Ok(cfg.genesis_target);
    }

    let window_start_height = BlockHeight(parent_index.height.0 + 1 - window_size);
    let window_start_id = store
        .block_id_at_height(window_start_height)?
        .ok_or_else(|| StorageError::Corruption("retarget window start height missing from index".into()))?;
    let window_start_block = store
        .block(&window_start_id)?
        .ok_or_else(|| StorageError::Corruption("retarget window start block missing".into()))?;
    let parent_block = store
        .block(&parent_id)?
        .ok_or_else(|| StorageError::Corruption(format!("missing parent block {parent_id}")))?;

    let actual = parent_block.header.timestamp.saturating_sub(window_start_block.header.timestamp);
    Ok(child_target(cfg, parent_index.target, actual))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ConsensusConfig {
        ConsensusConfig { target_window_size: 10, target_block_time_secs: 100, max_adjustment_factor: 4, ..ConsensusConfig::default() }
    }

    #[test]
    fn target_unchanged_when_window_takes_expected_time() {
        let cfg = cfg();
        let parent = Target::from_biguint(&BigUint::from(1_000_000u64));
        let next = child_target(&cfg, parent, expected_window_secs(&cfg));
        assert_eq!(next, parent);
    }

    #[test]
    fn target_loosens_when_blocks_came_slower_than_expected() {
        let cfg = cfg();
        let parent = Target::from_biguint(&BigUint::from(1_000_000u64));
        let next = child_target(&cfg, parent, expected_window_secs(&cfg) * 2);
        assert!(next.to_biguint() > parent.to_biguint());
    }

    #[test]
    fn target_tightens_when_blocks_came_faster_than_expected() {
        let cfg = cfg();
        let parent = Target::from_biguint(&BigUint::from(1_000_000u64));
        let next = child_target(&cfg, parent, expected_window_secs(&cfg) / 2);
        assert!(next.to_biguint() < parent.to_biguint());
    }

    #[test]
    fn adjustment_is_clamped_to_the_configured_factor() {
        let cfg = cfg();
        let parent = Target::from_biguint(&BigUint::from(1_000_000u64));
        // An extreme window (1000x slower) would ask for a 1000x loosening;
        // it must be clamped to at most `max_adjustment_factor`.
        let next = child_target(&cfg, parent, expected_window_secs(&cfg) * 1000);
        let max_allowed = parent.to_biguint() * BigUint::from(cfg.max_adjustment_factor);
        assert!(next.to_biguint() <= max_allowed);
    }
}
