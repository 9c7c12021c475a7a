//! Block and transaction validity predicates (§4.4, §4.3).
//!
//! Mirrors the teacher's split between a small composable
//! [`BlockValidator`] trait and a default implementation, generalized
//! from "accept everything" + ML checks into the full set of
//! structural, temporal, proof-of-block-stake, and ledger-balance
//! checks a PoBS block must pass before the engine will apply it.

use std::collections::HashSet;

use crate::crypto;
use crate::types::block::Block;
use crate::types::currency::Currency;
use crate::types::hash::Hash;
use crate::types::transaction::Transaction;
use crate::types::unlock::{LockTime, UnlockCondition, UnlockFulfillment};

use super::config::ConsensusConfig;
use super::difficulty;
use super::error::{ConsensusError, StorageError, TransientError, ValidationError};
use super::stake_modifier;
use super::store::StateStore;

/// Pluggable validity predicate for blocks.
pub trait BlockValidator {
    fn validate(&self, store: &dyn StateStore, block: &Block, now: u64) -> Result<(), ConsensusError>;
}

/// A trivial validator that accepts every block; useful for tests that
/// want to isolate engine wiring from consensus-rule correctness.
pub struct AcceptAllValidator;

impl BlockValidator for AcceptAllValidator {
    fn validate(&self, _store: &dyn StateStore, _block: &Block, _now: u64) -> Result<(), ConsensusError> {
        Ok(())
    }
}

/// The full proof-of-block-stake validity predicate.
pub struct DefaultBlockValidator {
    pub config: ConsensusConfig,
}

impl DefaultBlockValidator {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }
}

impl BlockValidator for DefaultBlockValidator {
    fn validate(&self, store: &dyn StateStore, block: &Block, now: u64) -> Result<(), ConsensusError> {
        validate_block(&self.config, store, block, now)
    }
}

pub fn validate_block(
    cfg: &ConsensusConfig,
    store: &dyn StateStore,
    block: &Block,
    now: u64,
) -> Result<(), ConsensusError> {
    let block_id = block.id();

    check_structural(cfg, block, block_id)?;
    let parent_index = store
        .block_index(&block.header.parent_id)?
        .ok_or(TransientError::OrphanBlock(block_id))?;

    if block.header.height != parent_index.height.0 + 1 {
        return Err(ValidationError::WrongHeight {
            block: block_id,
            expected: parent_index.height.0 + 1,
            got: block.header.height,
        }
        .into());
    }

    check_timestamp(cfg, store, block, block_id, parent_index.height, now)?;

    let expected_target = difficulty::target_for_child(cfg, store, block.header.parent_id)?;
    check_pobs(cfg, store, block, block_id, expected_target)?;

    check_transactions(cfg, store, block)?;
    check_block_balance(cfg, block, block_id)?;

    Ok(())
}

fn check_structural(cfg: &ConsensusConfig, block: &Block, block_id: crate::types::block::BlockId) -> Result<(), ConsensusError> {
    if !cfg.allow_empty_blocks && block.transactions.is_empty() {
        return Err(ValidationError::EmptyBlockDisallowed(block_id).into());
    }
    let size = block.canonical_bytes().len() as u64;
    if size > cfg.block_size_limit_bytes {
        return Err(ValidationError::BlockTooLarge { block: block_id, size, limit: cfg.block_size_limit_bytes }.into());
    }
    for tx in &block.transactions {
        if tx.arbitrary_data.len() as u64 > cfg.arbitrary_data_size_limit_bytes {
            return Err(ValidationError::ArbitraryDataTooLarge(tx.id()).into());
        }
    }
    Ok(())
}

/// Gathers the `window_size` most recent block timestamps ending at
/// (and including) `end_height`, oldest first.
fn recent_timestamps(
    store: &dyn StateStore,
    end_height: crate::types::index::BlockHeight,
    window_size: u64,
) -> Result<Vec<u64>, StorageError> {
    let mut out = Vec::new();
    let mut height = end_height;
    for _ in 0..window_size {
        let id = match store.block_id_at_height(height)? {
            Some(id) => id,
            None => break,
        };
        let block = store
            .block(&id)?
            .ok_or_else(|| StorageError::Corruption(format!("indexed block {id} missing from block store")))?;
        out.push(block.header.timestamp);
        match height.checked_sub(1) {
            Some(prev) => height = prev,
            None => break,
        }
    }
    out.reverse();
    Ok(out)
}

fn median(mut values: Vec<u64>) -> u64 {
    values.sort_unstable();
    values[values.len() / 2]
}

fn check_timestamp(
    cfg: &ConsensusConfig,
    store: &dyn StateStore,
    block: &Block,
    block_id: crate::types::block::BlockId,
    parent_height: crate::types::index::BlockHeight,
    now: u64,
) -> Result<(), ConsensusError> {
    let window = recent_timestamps(store, parent_height, cfg.median_timestamp_window)?;
    if !window.is_empty() {
        let med = median(window);
        if block.header.timestamp < med {
            return Err(ValidationError::TimestampNotIncreasing {
                block: block_id,
                timestamp: block.header.timestamp,
                window: cfg.median_timestamp_window,
            }
            .into());
        }
    }

    check_future_timestamp(cfg, block, now)
}

/// Stage 4 of §4.4: outright-reject a timestamp beyond
/// `ExtremeFutureThreshold`, transiently defer one beyond
/// `FutureThreshold` (or simply not-yet-arrived), accept otherwise.
///
/// Split out from [`check_timestamp`] so [`super::engine::ConsensusEngine`]
/// can apply this gate at admission time, before a block is even added
/// to the header index, rather than only at apply time.
pub fn check_future_timestamp(cfg: &ConsensusConfig, block: &Block, now: u64) -> Result<(), ConsensusError> {
    let block_id = block.id();

    if block.header.timestamp > now + cfg.extreme_future_threshold_secs {
        return Err(ValidationError::TimestampExtremeFuture {
            block: block_id,
            timestamp: block.header.timestamp,
            threshold: cfg.extreme_future_threshold_secs,
        }
        .into());
    }

    if block.header.timestamp > now + cfg.future_threshold_secs {
        return Err(ValidationError::TimestampTooFarInFuture {
            block: block_id,
            timestamp: block.header.timestamp,
            threshold: cfg.future_threshold_secs,
        }
        .into());
    }

    if block.header.timestamp > now {
        return Err(TransientError::NotYetDue { block: block_id, timestamp: block.header.timestamp }.into());
    }

    Ok(())
}

fn check_pobs(
    cfg: &ConsensusConfig,
    store: &dyn StateStore,
    block: &Block,
    block_id: crate::types::block::BlockId,
    target: crate::types::hash::Target,
) -> Result<(), ConsensusError> {
    let pobs = &block.header.pobs;
    let record = store
        .block_stake_output(&pobs.block_stake_output_id)?
        .ok_or(ValidationError::UnknownBlockStakeOutput(pobs.block_stake_output_id))?;

    if record.creation_block_height.0 != pobs.creation_block_height
        || record.creation_tx_index != pobs.creation_tx_index
        || record.creation_output_index != pobs.creation_output_index
    {
        return Err(ValidationError::Custom(format!(
            "block {block_id} pobs creation location does not match the staked output's recorded origin"
        ))
        .into());
    }

    let is_self_respend = block
        .transactions
        .first()
        .and_then(|tx| tx.block_stake_inputs.first())
        .is_some_and(|input| input.parent_id == pobs.block_stake_output_id);

    if !is_self_respend {
        let creation_id = store
            .block_id_at_height(record.creation_block_height)?
            .ok_or_else(|| StorageError::Corruption(format!("block-stake output creation height {} not indexed", record.creation_block_height)))?;
        let creation_block = store
            .block(&creation_id)?
            .ok_or_else(|| StorageError::Corruption(format!("indexed block {creation_id} missing from block store")))?;
        let age = block.header.timestamp.saturating_sub(creation_block.header.timestamp);
        if age < cfg.blockstake_aging_secs {
            return Err(ValidationError::StakeOutputNotAged(block_id).into());
        }
    }

    let expected_condition_hash = crypto::hash(&pobs.public_key.0);
    let address = record.output.condition.unlock_hash();
    if address.digest != expected_condition_hash {
        return Err(ValidationError::BadPobsSignature(block_id).into());
    }
    let header_digest = block.header.signing_digest();
    if !crypto::verify(&header_digest, &pobs.public_key, &pobs.signature) {
        return Err(ValidationError::BadPobsSignature(block_id).into());
    }

    let window = stake_modifier::window_for_height(
        store,
        cfg.stake_modifier_window,
        block.header.height,
        block.header.parent_id,
    )?;
    let modifier = stake_modifier::compute_stake_modifier(&window);

    let pobs_hash = pobs.pobs_hash(modifier, block.header.timestamp);
    let hash_int = num_bigint::BigUint::from_bytes_be(&pobs_hash.0);
    let stake_value = &record.output.value;
    if stake_value.is_zero() {
        return Err(ValidationError::PobsTargetNotMet(block_id).into());
    }
    let lhs = hash_int / stake_value.to_biguint();
    if lhs >= target.to_biguint() {
        return Err(ValidationError::PobsTargetNotMet(block_id).into());
    }

    Ok(())
}

fn check_transactions(cfg: &ConsensusConfig, store: &dyn StateStore, block: &Block) -> Result<(), ConsensusError> {
    let mut spent_coins = HashSet::new();
    let mut spent_stakes = HashSet::new();

    for tx in &block.transactions {
        check_transaction_fulfillments(cfg, store, block, tx, &mut spent_coins, &mut spent_stakes)?;
    }
    Ok(())
}

fn check_transaction_fulfillments(
    cfg: &ConsensusConfig,
    store: &dyn StateStore,
    block: &Block,
    tx: &Transaction,
    spent_coins: &mut HashSet<crate::types::transaction::CoinOutputId>,
    spent_stakes: &mut HashSet<crate::types::transaction::BlockStakeOutputId>,
) -> Result<(), ConsensusError> {
    if !tx.version.is_baseline() && !cfg.accepted_transaction_versions.contains(&tx.version) {
        return Err(ValidationError::UnknownTransactionVersion { tx: tx.id(), version: tx.version }.into());
    }

    let total_fee: Currency = tx.miner_fees.iter().cloned().sum();
    if total_fee < cfg.min_miner_fee {
        return Err(ValidationError::FeeBelowMinimum(tx.id()).into());
    }

    let mut input_value = Currency::zero();
    for (i, input) in tx.coin_inputs.iter().enumerate() {
        if !spent_coins.insert(input.parent_id) {
            return Err(ValidationError::DoubleSpend(tx.id(), input.parent_id).into());
        }
        let parent = store
            .coin_output(&input.parent_id)?
            .ok_or(ValidationError::UnknownCoinOutput(input.parent_id))?;
        let sig_hash = tx.sig_hash(i as u64);
        if !satisfies(&parent.condition, &input.fulfillment, sig_hash, block.header.height, block.header.timestamp, cfg) {
            return Err(ValidationError::FulfillmentMismatch(tx.id()).into());
        }
        input_value = input_value.checked_add(&parent.value);
    }

    let required = tx.coin_outputs_plus_fees();
    if input_value != required {
        return Err(ValidationError::CoinsNotBalanced {
            tx: tx.id(),
            inputs: input_value.to_string(),
            outputs: required.to_string(),
        }
        .into());
    }

    let mut stake_input_value = Currency::zero();
    for (i, input) in tx.block_stake_inputs.iter().enumerate() {
        if !spent_stakes.insert(input.parent_id) {
            return Err(ValidationError::Custom(format!("block-stake double spend of {}", input.parent_id)).into());
        }
        let parent = store
            .block_stake_output(&input.parent_id)?
            .ok_or(ValidationError::UnknownBlockStakeOutput(input.parent_id))?;
        let sig_hash = tx.sig_hash((tx.coin_inputs.len() + i) as u64);
        if !satisfies(&parent.output.condition, &input.fulfillment, sig_hash, block.header.height, block.header.timestamp, cfg) {
            return Err(ValidationError::FulfillmentMismatch(tx.id()).into());
        }
        stake_input_value = stake_input_value.checked_add(&parent.output.value);
    }

    let stake_output_value = tx.block_stake_outputs_sum();
    if !tx.block_stake_inputs.is_empty() || !tx.block_stake_outputs.is_empty() {
        if stake_input_value != stake_output_value {
            return Err(ValidationError::BlockStakesNotBalanced(tx.id()).into());
        }
    }

    Ok(())
}

fn satisfies(
    condition: &UnlockCondition,
    fulfillment: &UnlockFulfillment,
    sig_hash: Hash,
    current_height: u64,
    current_timestamp: u64,
    cfg: &ConsensusConfig,
) -> bool {
    match (condition, fulfillment) {
        (UnlockCondition::Nil, UnlockFulfillment::Nil) => true,
        (UnlockCondition::UnlockHash(addr), UnlockFulfillment::Single { public_key, signature }) => {
            let expected = crypto::hash(&public_key.0);
            addr.digest == expected && crypto::verify(&sig_hash, public_key, signature)
        }
        (UnlockCondition::TimeLock { lock, inner }, fulfillment) => {
            let lock_ok = lock.is_satisfied(current_height, current_timestamp);
            lock_ok && satisfies(inner, fulfillment, sig_hash, current_height, current_timestamp, cfg)
        }
        (UnlockCondition::MultiSignature { min_signatures, public_keys }, UnlockFulfillment::MultiSignature { pairs }) => {
            let mut used = HashSet::new();
            let mut valid = 0u64;
            for (pk, sig) in pairs {
                if !public_keys.contains(pk) {
                    continue;
                }
                if !used.insert(pk.0) {
                    continue;
                }
                if crypto::verify(&sig_hash, pk, sig) {
                    valid += 1;
                }
            }
            valid >= *min_signatures
        }
        (
            UnlockCondition::AtomicSwapLegacy { sender, receiver, hashed_secret, timelock },
            UnlockFulfillment::AtomicSwap { public_key, signature, secret },
        ) => {
            if !crypto::verify(&sig_hash, public_key, signature) {
                return false;
            }
            match secret {
                Some(preimage) => {
                    let digest = crypto::hash(preimage);
                    let pk_hash = crypto::hash(&public_key.0);
                    digest == *hashed_secret && pk_hash == receiver.digest && current_timestamp < *timelock
                }
                None => {
                    let pk_hash = crypto::hash(&public_key.0);
                    pk_hash == sender.digest && current_timestamp >= *timelock
                }
            }
        }
        _ => false,
    }
}

fn check_block_balance(
    cfg: &ConsensusConfig,
    block: &Block,
    block_id: crate::types::block::BlockId,
) -> Result<(), ConsensusError> {
    let expected = cfg.block_creation_reward.clone().checked_add(&block.total_fees());
    if block.total_miner_payout() != expected {
        return Err(ValidationError::MinerPayoutMismatch(block_id).into());
    }
    Ok(())
}
