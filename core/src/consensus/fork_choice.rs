//! Fork-choice rule for selecting the best chain.
//!
//! Generalizes the teacher's height-based `LongestChainForkChoice` into
//! the accumulated-work rule a PoBS chain needs: since the PoBS target
//! can change block to block, a longer chain is not necessarily a
//! heavier one.

use crate::types::index::AccumulatedWork;

use super::store::TipInfo;

/// Abstraction over fork-choice rules: given the current tip's
/// accumulated work (if any) and a candidate's, decide whether the
/// candidate should become the new tip.
pub trait ForkChoice {
    fn should_update_tip(&self, current_tip: Option<&TipInfo>, candidate_work: &AccumulatedWork) -> bool;
}

/// Prefers whichever chain has accumulated the most proof-of-block-stake
/// work, ties kept with the incumbent tip.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaviestChainForkChoice;

impl ForkChoice for HeaviestChainForkChoice {
    fn should_update_tip(&self, current_tip: Option<&TipInfo>, candidate_work: &AccumulatedWork) -> bool {
        match current_tip {
            None => true,
            Some(tip) => candidate_work > &tip.accumulated_work,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::block::BlockId;
    use crate::types::hash::{Hash, Target};
    use crate::types::index::BlockHeight;

    fn tip(work: AccumulatedWork) -> TipInfo {
        TipInfo { block_id: BlockId(Hash::ZERO), height: BlockHeight(1), accumulated_work: work }
    }

    #[test]
    fn no_current_tip_always_accepts_candidate() {
        let fc = HeaviestChainForkChoice;
        assert!(fc.should_update_tip(None, &AccumulatedWork::block_work(Target::MAX)));
    }

    #[test]
    fn heavier_candidate_replaces_tip() {
        let fc = HeaviestChainForkChoice;
        let light = AccumulatedWork::block_work(Target::MAX);
        let heavy = light.add_block(Target::MAX);
        assert!(fc.should_update_tip(Some(&tip(light)), &heavy));
    }

    #[test]
    fn lighter_candidate_does_not_replace_tip() {
        let fc = HeaviestChainForkChoice;
        let light = AccumulatedWork::block_work(Target::MAX);
        let heavy = light.clone().add_block(Target::MAX);
        assert!(!fc.should_update_tip(Some(&tip(heavy)), &light));
    }
}
