//! Block creator: the proof-of-block-stake solver loop and
//! candidate-block assembly.
//!
//! The solver loop runs as a simple five-state state machine on a
//! timer: a loop with a sleep and a stop-flag check between iterations
//! (see `core/src/main.rs`).

use num_bigint::BigUint;

use crate::consensus::store::{BlockStakeOutputRecord, StateStore};
use crate::consensus::{ConsensusConfig, ConsensusError, StorageError};
use crate::consensus::{difficulty, stake_modifier};
use crate::crypto::{self, PublicKey, SecretKey, Signature};
use crate::encoding::Encode;
use crate::types::block::{Block, BlockId, Header, PobsProof};
use crate::types::currency::Currency;
use crate::types::transaction::{BlockStakeInput, BlockStakeOutput, BlockStakeOutputId, Transaction};
use crate::types::unlock::{UnlockCondition, UnlockFulfillment};
use crate::txpool::TxPool;

/// A block-stake output the creator holds the spending key for. Sourcing
/// these from a wallet is out of scope; callers supply them directly.
/// The output's current value and origin are looked up fresh from the
/// store on every iteration rather than cached here.
#[derive(Clone)]
pub struct StakeSource {
    pub output_id: BlockStakeOutputId,
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

/// Where the solver loop is within one iteration (§4.6's state machine).
/// Transitions are unconditional on solve failure: the loop always
/// returns to `Idle` after a sleep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreatorState {
    Idle,
    Scanning,
    Solved,
    Submitting,
    Error,
}

/// Runs the PoBS solver loop and assembles candidate blocks.
pub struct BlockCreator {
    config: ConsensusConfig,
    /// Width, in seconds, of the candidate-timestamp search window tried
    /// per stake source per iteration (§4.6 step 2; "typically 10s").
    pub search_window_secs: u64,
    /// Where block subsidy and transaction fees are paid.
    pub payout_condition: UnlockCondition,
    state: CreatorState,
}

impl BlockCreator {
    pub fn new(config: ConsensusConfig, payout_condition: UnlockCondition) -> Self {
        Self { config, search_window_secs: 10, payout_condition, state: CreatorState::Idle }
    }

    pub fn state(&self) -> CreatorState {
        self.state
    }

    /// Runs one solver iteration over every supplied stake source.
    /// Returns `Ok(Some(block))` if a stake solved the lottery within
    /// the search window, `Ok(None)` if nothing solved this iteration
    /// (the caller should sleep and retry).
    pub fn try_create_block(
        &mut self,
        store: &dyn StateStore,
        pool: &mut dyn TxPool,
        stake_sources: &[StakeSource],
        now: u64,
    ) -> Result<Option<Block>, ConsensusError> {
        self.state = CreatorState::Scanning;

        let tip = match store.tip()? {
            Some(tip) => tip,
            None => {
                self.state = CreatorState::Error;
                return Ok(None);
            }
        };
        let parent_block = store
            .block(&tip.block_id)?
            .ok_or_else(|| StorageError::Corruption(format!("tip block {} missing from store", tip.block_id)))?;
        let candidate_height = tip.height.succ().0;
        let target = difficulty::target_for_child(&self.config, store, tip.block_id)?;
        let window = stake_modifier::window_for_height(
            store,
            self.config.stake_modifier_window,
            candidate_height,
            tip.block_id,
        )?;
        let modifier = stake_modifier::compute_stake_modifier(&window);

        for source in stake_sources {
            let record = match store.block_stake_output(&source.output_id)? {
                Some(record) => record,
                None => continue,
            };
            if record.output.value.is_zero() {
                continue;
            }

            let solved_timestamp = (now..now + self.search_window_secs.max(1))
                .filter(|&t| t > parent_block.header.timestamp)
                .find(|&t| {
                    let pobs_hash = crate::types::block::PobsProof {
                        block_stake_output_id: source.output_id,
                        creation_block_height: record.creation_block_height.0,
                        creation_tx_index: record.creation_tx_index,
                        creation_output_index: record.creation_output_index,
                        public_key: source.public_key,
                        signature: Signature([0u8; 64]),
                    }
                    .pobs_hash(modifier, t);
                    let hash_int = BigUint::from_bytes_be(&pobs_hash.0);
                    (hash_int / record.output.value.to_biguint()) < target.to_biguint()
                });

            let Some(timestamp) = solved_timestamp else { continue };

            self.state = CreatorState::Solved;
            let block = self.assemble_block(pool, source, &record, tip.block_id, candidate_height, timestamp);
            self.state = CreatorState::Submitting;
            return Ok(Some(block));
        }

        self.state = CreatorState::Idle;
        Ok(None)
    }

    /// Builds the candidate block: a self-respend of the staked output
    /// (so the aging rule's zeroth-input-of-zeroth-transaction exemption
    /// applies), transactions greedily drawn from `pool` under the size
    /// limit, and miner-payout outputs covering the block subsidy plus
    /// collected fees.
    fn assemble_block(
        &mut self,
        pool: &mut dyn TxPool,
        source: &StakeSource,
        record: &BlockStakeOutputRecord,
        parent_id: BlockId,
        height: u64,
        timestamp: u64,
    ) -> Block {
        let respend = self.build_self_respend(source, record);
        let reserved_bytes = respend.encode_to_vec().len() as u64;
        let pool_budget = self.config.block_size_limit_bytes.saturating_sub(reserved_bytes) as usize;
        let pool_txs = pool.select_for_block(self.config.max_block_transactions.saturating_sub(1), pool_budget);

        let total_fees: Currency = pool_txs.iter().flat_map(|tx| tx.miner_fees.iter().cloned()).sum();
        let miner_payout_value = self.config.block_creation_reward.clone().checked_add(&total_fees);

        let mut transactions = Vec::with_capacity(pool_txs.len() + 1);
        transactions.push(respend);
        transactions.extend(pool_txs);

        let mut header = Header {
            parent_id,
            height,
            timestamp,
            pobs: PobsProof {
                block_stake_output_id: source.output_id,
                creation_block_height: record.creation_block_height.0,
                creation_tx_index: record.creation_tx_index,
                creation_output_index: record.creation_output_index,
                public_key: source.public_key,
                signature: Signature([0u8; 64]),
            },
        };
        let digest = header.signing_digest();
        header.pobs.signature = crypto::sign(&digest, &source.secret_key);

        Block {
            header,
            miner_payouts: vec![crate::types::transaction::CoinOutput {
                value: miner_payout_value,
                condition: self.payout_condition.clone(),
            }],
            transactions,
        }
    }

    /// The zeroth transaction: spends the staked output and recreates an
    /// equal-value block-stake output under the same condition, exempt
    /// from the aging rule because it sits at input 0 of transaction 0.
    fn build_self_respend(&self, source: &StakeSource, record: &BlockStakeOutputRecord) -> Transaction {
        let mut tx = Transaction {
            version: crate::types::version::TransactionVersion::default(),
            coin_inputs: vec![],
            coin_outputs: vec![],
            block_stake_inputs: vec![BlockStakeInput {
                parent_id: source.output_id,
                fulfillment: UnlockFulfillment::Nil,
            }],
            block_stake_outputs: vec![BlockStakeOutput {
                value: record.output.value.clone(),
                condition: record.output.condition.clone(),
            }],
            miner_fees: vec![],
            arbitrary_data: vec![],
        };
        let sig_hash = tx.sig_hash(0);
        let signature = crypto::sign(&sig_hash, &source.secret_key);
        tx.block_stake_inputs[0].fulfillment = UnlockFulfillment::Single { public_key: source.public_key, signature };
        tx
    }
}

/// Condition implementations may need to construct an owner's
/// [`UnlockCondition`]; re-exported here for callers assembling
/// [`StakeSource`]s from keypairs without importing `types::unlock`
/// separately.
pub fn unlock_hash_condition_for(public_key: &PublicKey) -> UnlockCondition {
    UnlockCondition::UnlockHash(crate::types::unlock::UnlockHash::new(
        crate::types::unlock::UnlockConditionType::UnlockHash,
        crypto::hash(&public_key.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::config::ConsensusConfig;
    use crate::crypto::generate_keypair;
    use crate::storage::mem::MemoryStateStore;
    use crate::types::block::{Block, Header, PobsProof};
    use crate::types::currency::Currency;
    use crate::types::hash::{Hash, Target};
    use crate::types::transaction::{BlockStakeOutput, BlockStakeOutputId};
    use crate::txpool::EmptyTxPool;
    use num_bigint::BigUint;

    fn genesis_with_stake(owner_pk: &PublicKey, stake_value: u64) -> (Block, BlockStakeOutputId) {
        let genesis_pk = generate_keypair([99u8; 32]).1;
        let header = Header {
            parent_id: BlockId(Hash::ZERO),
            height: 0,
            timestamp: 0,
            pobs: PobsProof {
                block_stake_output_id: BlockStakeOutputId(Hash::ZERO),
                creation_block_height: 0,
                creation_tx_index: 0,
                creation_output_index: 0,
                public_key: genesis_pk,
                signature: Signature([0u8; 64]),
            },
        };
        let tx = Transaction {
            version: crate::types::version::TransactionVersion::default(),
            coin_inputs: vec![],
            coin_outputs: vec![],
            block_stake_inputs: vec![],
            block_stake_outputs: vec![BlockStakeOutput {
                value: Currency::from_u64(stake_value),
                condition: unlock_hash_condition_for(owner_pk),
            }],
            miner_fees: vec![],
            arbitrary_data: vec![],
        };
        let output_id = tx.block_stake_output_id(0);
        let block = Block { header, miner_payouts: vec![], transactions: vec![tx] };
        (block, output_id)
    }

    #[test]
    fn idle_creator_returns_none_against_an_uninitialized_store() {
        let (_sk, pk) = generate_keypair([1u8; 32]);
        let mut creator = BlockCreator::new(ConsensusConfig::default(), unlock_hash_condition_for(&pk));
        let store = MemoryStateStore::new();
        let mut pool = EmptyTxPool;
        let result = creator.try_create_block(&store, &mut pool, &[], 1_000).unwrap();
        assert!(result.is_none());
        assert_eq!(creator.state(), CreatorState::Error);
    }

    #[test]
    fn a_maximal_stake_against_the_loosest_target_solves_immediately() {
        let (sk, pk) = generate_keypair([2u8; 32]);
        let (genesis, output_id) = genesis_with_stake(&pk, u64::MAX);
        let mut store = MemoryStateStore::new();
        store.init_genesis(&genesis, Target::MAX, 0).unwrap();

        let mut cfg = ConsensusConfig::default();
        cfg.maturity_delay = 0;
        cfg.stake_modifier_window = 1;
        cfg.genesis_target = Target::MAX;

        let mut creator = BlockCreator::new(cfg, unlock_hash_condition_for(&pk));
        let mut pool = EmptyTxPool;
        let source = StakeSource { output_id, secret_key: sk, public_key: pk };

        let block = creator
            .try_create_block(&store, &mut pool, &[source], 1_000_000)
            .unwrap()
            .expect("an overwhelming stake against the loosest target must solve within the search window");

        assert_eq!(block.header.height, 1);
        assert_eq!(creator.state(), CreatorState::Submitting);
        // The zeroth transaction must be the self-respend of the staked output.
        assert_eq!(block.transactions[0].block_stake_inputs[0].parent_id, output_id);
    }

    #[test]
    fn a_genesis_stake_solves_at_height_one_despite_a_long_maturity_delay() {
        // maturity_delay gates delayed miner-payout spendability only; it
        // must not block the genesis block-stake output from producing
        // the very first block.
        let (sk, pk) = generate_keypair([3u8; 32]);
        let (genesis, output_id) = genesis_with_stake(&pk, u64::MAX);
        let mut store = MemoryStateStore::new();
        store.init_genesis(&genesis, Target::MAX, 0).unwrap();

        let mut cfg = ConsensusConfig::default();
        cfg.maturity_delay = 144;
        cfg.stake_modifier_window = 1;
        cfg.genesis_target = Target::MAX;

        let mut creator = BlockCreator::new(cfg, unlock_hash_condition_for(&pk));
        let mut pool = EmptyTxPool;
        let source = StakeSource { output_id, secret_key: sk, public_key: pk };

        let block = creator
            .try_create_block(&store, &mut pool, &[source], 1_000_000)
            .unwrap()
            .expect("maturity_delay must not gate PoBS stake eligibility");
        assert_eq!(block.header.height, 1);
    }
}
