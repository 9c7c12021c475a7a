//! Consensus-change notifications emitted by the engine on every block
//! application and reorg.

use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::encoding::Encode;
use crate::types::block::Block;
use crate::types::hash::Hash;

/// Describes a single atomic shift of the canonical chain: the blocks
/// that left it (reverted, in child-to-parent order) and the blocks
/// that joined it (applied, in parent-to-child order). For a simple
/// extension of the tip, `reverted_blocks` is empty and `applied_blocks`
/// holds exactly one block. For a reorg, both are non-empty and must be
/// processed atomically by subscribers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusChange {
    pub change_id: Hash,
    pub reverted_blocks: Vec<Block>,
    pub applied_blocks: Vec<Block>,
}

impl ConsensusChange {
    /// Builds a change and derives its id deterministically from the
    /// blocks it carries, so that two nodes which apply the same reorg
    /// independently agree on the id without coordinating.
    pub fn new(reverted_blocks: Vec<Block>, applied_blocks: Vec<Block>) -> Self {
        let mut buf = Vec::new();
        for b in &reverted_blocks {
            b.id().encode(&mut buf);
        }
        for b in &applied_blocks {
            b.id().encode(&mut buf);
        }
        let change_id = crypto::hash(&buf);
        ConsensusChange { change_id, reverted_blocks, applied_blocks }
    }

    pub fn is_reorg(&self) -> bool {
        !self.reverted_blocks.is_empty()
    }
}
