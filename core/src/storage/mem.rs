//! In-memory [`StateStore`].
//!
//! Keeps the whole UTXO set and block index in `HashMap`s. Useful for
//! unit tests, the block-creator's own tests, and short-lived devnets;
//! everything is lost on process exit.

use std::collections::HashMap;

use crate::consensus::error::StorageError;
use crate::consensus::store::{BlockIndexEntry, BlockStakeOutputRecord, StateStore, TipInfo};
use crate::types::block::{Block, BlockId};
use crate::types::hash::Target;
use crate::types::index::{AccumulatedWork, BlockHeight};
use crate::types::transaction::{BlockStakeOutput, BlockStakeOutputId, CoinOutput, CoinOutputId};

/// Everything needed to reverse one `apply_block` call.
struct BlockUndo {
    parent_id: BlockId,
    consumed_coin_outputs: Vec<(CoinOutputId, CoinOutput)>,
    consumed_stake_outputs: Vec<(BlockStakeOutputId, BlockStakeOutputRecord)>,
    created_coin_output_ids: Vec<CoinOutputId>,
    created_stake_output_ids: Vec<BlockStakeOutputId>,
    delayed_output_ids: Vec<CoinOutputId>,
    delayed_maturity_height: u64,
    /// Outputs that matured (moved from the delayed set into the
    /// spendable set) exactly at this block's height.
    matured_this_height: Vec<(CoinOutputId, CoinOutput)>,
}

#[derive(Default)]
pub struct MemoryStateStore {
    blocks: HashMap<BlockId, Block>,
    index: HashMap<BlockId, BlockIndexEntry>,
    height_index: HashMap<u64, BlockId>,
    tip: Option<TipInfo>,
    coin_outputs: HashMap<CoinOutputId, CoinOutput>,
    block_stake_outputs: HashMap<BlockStakeOutputId, BlockStakeOutputRecord>,
    delayed_coin_outputs: HashMap<u64, Vec<(CoinOutputId, CoinOutput)>>,
    undo_log: HashMap<BlockId, BlockUndo>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an empty store with a genesis block at height 0. Genesis has
    /// no undo record: the engine never reverts past it.
    pub fn init_genesis(&mut self, genesis: &Block, target: Target, maturity_delay: u64) -> Result<(), StorageError> {
        self.apply_block(genesis, target, AccumulatedWork::zero().add_block(target), maturity_delay)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn block(&self, id: &BlockId) -> Result<Option<Block>, StorageError> {
        Ok(self.blocks.get(id).cloned())
    }

    fn block_index(&self, id: &BlockId) -> Result<Option<BlockIndexEntry>, StorageError> {
        Ok(self.index.get(id).cloned())
    }

    fn block_id_at_height(&self, height: BlockHeight) -> Result<Option<BlockId>, StorageError> {
        Ok(self.height_index.get(&height.0).copied())
    }

    fn tip(&self) -> Result<Option<TipInfo>, StorageError> {
        Ok(self.tip.clone())
    }

    fn coin_output(&self, id: &CoinOutputId) -> Result<Option<CoinOutput>, StorageError> {
        Ok(self.coin_outputs.get(id).cloned())
    }

    fn block_stake_output(&self, id: &BlockStakeOutputId) -> Result<Option<BlockStakeOutputRecord>, StorageError> {
        Ok(self.block_stake_outputs.get(id).cloned())
    }

    fn apply_block(&mut self, block: &Block, target: Target, work: AccumulatedWork, maturity_delay: u64) -> Result<(), StorageError> {
        let id = block.id();
        let height = block.header.height;

        let mut consumed_coin_outputs = Vec::new();
        let mut consumed_stake_outputs = Vec::new();
        let mut created_coin_output_ids = Vec::new();
        let mut created_stake_output_ids = Vec::new();

        for (tx_index, tx) in block.transactions.iter().enumerate() {
            for input in &tx.coin_inputs {
                let parent = self
                    .coin_outputs
                    .remove(&input.parent_id)
                    .ok_or_else(|| StorageError::Corruption(format!("apply_block: coin output {} already gone", input.parent_id)))?;
                consumed_coin_outputs.push((input.parent_id, parent));
            }
            for input in &tx.block_stake_inputs {
                let parent = self
                    .block_stake_outputs
                    .remove(&input.parent_id)
                    .ok_or_else(|| StorageError::Corruption(format!("apply_block: block-stake output {} already gone", input.parent_id)))?;
                consumed_stake_outputs.push((input.parent_id, parent));
            }
            for (i, output) in tx.coin_outputs.iter().enumerate() {
                let out_id = tx.coin_output_id(i);
                self.coin_outputs.insert(out_id, output.clone());
                created_coin_output_ids.push(out_id);
            }
            for (i, output) in tx.block_stake_outputs.iter().enumerate() {
                let out_id = tx.block_stake_output_id(i);
                let record = BlockStakeOutputRecord {
                    output: output.clone(),
                    creation_block_height: BlockHeight(height),
                    creation_tx_index: tx_index as u64,
                    creation_output_index: i as u64,
                };
                self.block_stake_outputs.insert(out_id, record);
                created_stake_output_ids.push(out_id);
            }
        }

        let maturity_height = height + maturity_delay;
        let mut delayed_output_ids = Vec::new();
        for (i, payout) in block.miner_payouts.iter().enumerate() {
            let out_id = block.miner_payout_id(i);
            self.delayed_coin_outputs.entry(maturity_height).or_default().push((out_id, payout.clone()));
            delayed_output_ids.push(out_id);
        }

        let matured_this_height = self.delayed_coin_outputs.remove(&height).unwrap_or_default();
        for (out_id, output) in &matured_this_height {
            self.coin_outputs.insert(*out_id, output.clone());
        }

        self.blocks.insert(id, block.clone());
        self.index.insert(id, BlockIndexEntry { height: BlockHeight(height), target, accumulated_work: work.clone() });
        self.height_index.insert(height, id);
        self.tip = Some(TipInfo { block_id: id, height: BlockHeight(height), accumulated_work: work });

        self.undo_log.insert(
            id,
            BlockUndo {
                parent_id: block.header.parent_id,
                consumed_coin_outputs,
                consumed_stake_outputs,
                created_coin_output_ids,
                created_stake_output_ids,
                delayed_output_ids,
                delayed_maturity_height: maturity_height,
                matured_this_height,
            },
        );

        Ok(())
    }

    fn revert_tip(&mut self) -> Result<Block, StorageError> {
        let tip = self.tip.clone().ok_or_else(|| StorageError::Corruption("revert_tip: store has no tip".into()))?;
        let undo = self
            .undo_log
            .remove(&tip.block_id)
            .ok_or_else(|| StorageError::Corruption("revert_tip: no undo record for tip".into()))?;
        let block = self
            .blocks
            .remove(&tip.block_id)
            .ok_or_else(|| StorageError::Corruption("revert_tip: tip block missing".into()))?;

        self.index.remove(&tip.block_id);
        self.height_index.remove(&tip.height.0);

        for (out_id, output) in undo.consumed_coin_outputs {
            self.coin_outputs.insert(out_id, output);
        }
        for (out_id, record) in undo.consumed_stake_outputs {
            self.block_stake_outputs.insert(out_id, record);
        }
        for out_id in &undo.created_coin_output_ids {
            self.coin_outputs.remove(out_id);
        }
        for out_id in &undo.created_stake_output_ids {
            self.block_stake_outputs.remove(out_id);
        }
        if !undo.delayed_output_ids.is_empty() {
            if let Some(list) = self.delayed_coin_outputs.get_mut(&undo.delayed_maturity_height) {
                list.retain(|(id, _)| !undo.delayed_output_ids.contains(id));
            }
        }
        if !undo.matured_this_height.is_empty() {
            for (out_id, _) in &undo.matured_this_height {
                self.coin_outputs.remove(out_id);
            }
            self.delayed_coin_outputs.insert(tip.height.0, undo.matured_this_height);
        }

        self.tip = self.index.get(&undo.parent_id).map(|idx| TipInfo {
            block_id: undo.parent_id,
            height: idx.height,
            accumulated_work: idx.accumulated_work.clone(),
        });

        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;
    use crate::types::block::{Header, PobsProof};
    use crate::types::currency::Currency;
    use crate::types::hash::Hash;
    use crate::types::transaction::{CoinInput, Transaction};
    use crate::types::unlock::{UnlockCondition, UnlockConditionType, UnlockFulfillment, UnlockHash};

    fn header(parent: BlockId, height: u64, timestamp: u64) -> Header {
        let (_sk, pk) = generate_keypair([height as u8 + 1; 32]);
        Header {
            parent_id: parent,
            height,
            timestamp,
            pobs: PobsProof {
                block_stake_output_id: BlockStakeOutputId(Hash([9u8; 32])),
                creation_block_height: 0,
                creation_tx_index: 0,
                creation_output_index: 0,
                public_key: pk,
                signature: crate::crypto::Signature([0u8; 64]),
            },
        }
    }

    fn addr(byte: u8) -> UnlockCondition {
        UnlockCondition::UnlockHash(UnlockHash::new(UnlockConditionType::UnlockHash, Hash([byte; 32])))
    }

    #[test]
    fn genesis_is_queryable_after_init() {
        let mut store = MemoryStateStore::new();
        let genesis = Block { header: header(BlockId(Hash::ZERO), 0, 0), miner_payouts: vec![], transactions: vec![] };
        store.init_genesis(&genesis, Target::MAX, 10).unwrap();
        assert_eq!(store.tip().unwrap().unwrap().block_id, genesis.id());
        assert_eq!(store.block(&genesis.id()).unwrap().unwrap().header.height, 0);
    }

    #[test]
    fn spending_a_coin_output_removes_it_and_creates_the_new_one() {
        let mut store = MemoryStateStore::new();
        let genesis = Block { header: header(BlockId(Hash::ZERO), 0, 0), miner_payouts: vec![], transactions: vec![] };
        store.init_genesis(&genesis, Target::MAX, 10).unwrap();

        let funding_tx = Transaction {
            version: crate::types::version::TransactionVersion::default(),
            coin_inputs: vec![],
            coin_outputs: vec![CoinOutput { value: Currency::from_u64(100), condition: addr(1) }],
            block_stake_inputs: vec![],
            block_stake_outputs: vec![],
            miner_fees: vec![],
            arbitrary_data: vec![],
        };
        let funded_id = funding_tx.coin_output_id(0);
        let b1 = Block { header: header(genesis.id(), 1, 10), miner_payouts: vec![], transactions: vec![funding_tx] };
        store.apply_block(&b1, Target::MAX, AccumulatedWork::zero(), 10).unwrap();
        assert!(store.coin_output(&funded_id).unwrap().is_some());

        let spend_tx = Transaction {
            version: crate::types::version::TransactionVersion::default(),
            coin_inputs: vec![CoinInput { parent_id: funded_id, fulfillment: UnlockFulfillment::Nil }],
            coin_outputs: vec![CoinOutput { value: Currency::from_u64(100), condition: addr(2) }],
            block_stake_inputs: vec![],
            block_stake_outputs: vec![],
            miner_fees: vec![],
            arbitrary_data: vec![],
        };
        let b2 = Block { header: header(b1.id(), 2, 20), miner_payouts: vec![], transactions: vec![spend_tx] };
        store.apply_block(&b2, Target::MAX, AccumulatedWork::zero(), 10).unwrap();
        assert!(store.coin_output(&funded_id).unwrap().is_none());
    }

    #[test]
    fn miner_payout_is_locked_until_maturity_then_spendable() {
        let mut store = MemoryStateStore::new();
        let genesis = Block { header: header(BlockId(Hash::ZERO), 0, 0), miner_payouts: vec![], transactions: vec![] };
        store.init_genesis(&genesis, Target::MAX, 2).unwrap();

        let payout = CoinOutput { value: Currency::from_u64(10), condition: addr(3) };
        let b1 = Block { header: header(genesis.id(), 1, 10), miner_payouts: vec![payout.clone()], transactions: vec![] };
        let payout_id = b1.miner_payout_id(0);
        store.apply_block(&b1, Target::MAX, AccumulatedWork::zero(), 2).unwrap();
        assert!(store.coin_output(&payout_id).unwrap().is_none());

        let b2 = Block { header: header(b1.id(), 2, 20), miner_payouts: vec![], transactions: vec![] };
        store.apply_block(&b2, Target::MAX, AccumulatedWork::zero(), 2).unwrap();
        assert!(store.coin_output(&payout_id).unwrap().is_none());

        let b3 = Block { header: header(b2.id(), 3, 30), miner_payouts: vec![], transactions: vec![] };
        store.apply_block(&b3, Target::MAX, AccumulatedWork::zero(), 2).unwrap();
        assert!(store.coin_output(&payout_id).unwrap().is_some());
    }

    #[test]
    fn revert_tip_restores_consumed_outputs_and_drops_created_ones() {
        let mut store = MemoryStateStore::new();
        let genesis = Block { header: header(BlockId(Hash::ZERO), 0, 0), miner_payouts: vec![], transactions: vec![] };
        store.init_genesis(&genesis, Target::MAX, 10).unwrap();

        let funding_tx = Transaction {
            version: crate::types::version::TransactionVersion::default(),
            coin_inputs: vec![],
            coin_outputs: vec![CoinOutput { value: Currency::from_u64(50), condition: addr(4) }],
            block_stake_inputs: vec![],
            block_stake_outputs: vec![],
            miner_fees: vec![],
            arbitrary_data: vec![],
        };
        let funded_id = funding_tx.coin_output_id(0);
        let b1 = Block { header: header(genesis.id(), 1, 10), miner_payouts: vec![], transactions: vec![funding_tx] };
        store.apply_block(&b1, Target::MAX, AccumulatedWork::zero(), 10).unwrap();

        let reverted = store.revert_tip().unwrap();
        assert_eq!(reverted.id(), b1.id());
        assert!(store.coin_output(&funded_id).unwrap().is_none());
        assert_eq!(store.tip().unwrap().unwrap().block_id, genesis.id());
    }
}
