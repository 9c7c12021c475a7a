//! Storage abstraction used by the consensus engine (§4.5, §5).
//!
//! A single type implements the whole trait and owns the entire UTXO
//! set; the engine never holds two stores open on the same state at
//! once, matching the single-writer model. `apply_block`/
//! `revert_tip` are the only mutating entry points: every other method
//! is a read.

use crate::types::block::{Block, BlockId};
use crate::types::hash::Target;
use crate::types::index::{AccumulatedWork, BlockHeight};
use crate::types::transaction::{BlockStakeOutput, BlockStakeOutputId, CoinOutput, CoinOutputId};

use super::error::StorageError;

/// Metadata the store keeps about every block it has indexed, separate
/// from the block's own wire bytes: the height it sits at, the target
/// it had to solve (needed to retarget its children without recursing
/// to genesis), and the accumulated work of the chain up to and
/// including it.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockIndexEntry {
    pub height: BlockHeight,
    pub target: Target,
    pub accumulated_work: AccumulatedWork,
}

/// A block-stake output together with the location at which it was
/// created. The location (not just the value) feeds the PoBS lottery
/// preimage, so the store must retain it for as long as the output is
/// unspent.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockStakeOutputRecord {
    pub output: BlockStakeOutput,
    pub creation_block_height: BlockHeight,
    pub creation_tx_index: u64,
    pub creation_output_index: u64,
}

/// Everything about the current canonical tip the engine needs without
/// re-deriving it from the block itself.
#[derive(Clone, Debug, PartialEq)]
pub struct TipInfo {
    pub block_id: BlockId,
    pub height: BlockHeight,
    pub accumulated_work: AccumulatedWork,
}

/// Abstract storage interface used by the consensus engine.
///
/// Implementations can be backed by in-memory maps ([`super::super::storage::mem`])
/// or RocksDB ([`super::super::storage::rocksdb`]). `apply_block` and
/// `revert_tip` must be atomic: either every index changes they imply
/// lands, or none does.
pub trait StateStore {
    fn block(&self, id: &BlockId) -> Result<Option<Block>, StorageError>;

    fn block_index(&self, id: &BlockId) -> Result<Option<BlockIndexEntry>, StorageError>;

    /// The id of the block at `height` on the current canonical chain,
    /// used for the stake-modifier window, the difficulty retarget
    /// window, and the median-timestamp rule.
    fn block_id_at_height(&self, height: BlockHeight) -> Result<Option<BlockId>, StorageError>;

    fn tip(&self) -> Result<Option<TipInfo>, StorageError>;

    fn coin_output(&self, id: &CoinOutputId) -> Result<Option<CoinOutput>, StorageError>;

    fn block_stake_output(&self, id: &BlockStakeOutputId) -> Result<Option<BlockStakeOutputRecord>, StorageError>;

    /// Appends `block` to the canonical chain as the new tip, with
    /// `work` its accumulated difficulty. The implementation must, in
    /// one atomic unit: record the block and its height, consume every
    /// input's parent output, create every output the block's
    /// transactions and miner payouts define (miner payouts recorded as
    /// delayed until `height + maturity_delay`), mature any
    /// previously-delayed outputs whose maturation height is now
    /// reached, and advance the tip pointer.
    fn apply_block(
        &mut self,
        block: &Block,
        target: Target,
        work: AccumulatedWork,
        maturity_delay: u64,
    ) -> Result<(), StorageError>;

    /// Undoes the current tip block, returning it. The implementation
    /// must reverse exactly what `apply_block` did: restore consumed
    /// outputs, remove created outputs (maturing or not), and move the
    /// tip pointer back to the reverted block's parent.
    fn revert_tip(&mut self) -> Result<Block, StorageError>;
}
