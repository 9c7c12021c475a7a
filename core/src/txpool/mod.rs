//! Unconfirmed-transaction pool.
//!
//! Generalizes the teacher's `TxPool` trait (which only exposed
//! `select_for_block`) into a concrete mempool that also admits
//! transactions as a group, orders them by dependency, and purges its
//! contents wholesale after a reorg invalidates them.

use std::collections::{HashMap, HashSet};

use crate::consensus::{StateStore, ValidationError};
use crate::encoding::Encode;
use crate::types::transaction::{BlockStakeOutputId, CoinOutputId, Transaction, TransactionId};

/// A transaction rejected from admission, paired with why.
#[derive(Debug)]
pub struct RejectedTransaction {
    pub id: TransactionId,
    pub reason: PoolError,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("transaction {0} conflicts with another transaction already in the pool or in this set")]
    Conflict(TransactionId),
    #[error("transaction {0} spends an output unknown to the current chain state")]
    UnknownOutput(TransactionId),
    #[error("transaction {0} failed validation: {1}")]
    Invalid(TransactionId, ValidationError),
}

/// Selects transactions for inclusion in a candidate block.
///
/// Consensus and the block creator do not care how transactions are
/// stored or gossiped; they only need a way to ask for a batch that
/// fits into a block.
pub trait TxPool {
    fn select_for_block(&mut self, max_txs: usize, max_bytes: usize) -> Vec<Transaction>;
}

/// An in-memory mempool: the set of valid, non-conflicting, unconfirmed
/// transactions a block creator may draw from.
#[derive(Default)]
pub struct MempoolTransactionPool {
    by_id: HashMap<TransactionId, Transaction>,
    spent_coins: HashSet<CoinOutputId>,
    spent_stakes: HashSet<BlockStakeOutputId>,
    /// Insertion order, used as a stable fallback ordering for
    /// transactions with no dependency relationship between them.
    order: Vec<TransactionId>,
}

impl MempoolTransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Validates `txns` as a group against `store`'s current best state
    /// plus every transaction already admitted to the pool. Either every
    /// transaction is admitted, or none is; the first conflict or
    /// invalid transaction aborts the whole set.
    pub fn accept_transaction_set(
        &mut self,
        store: &dyn StateStore,
        txns: Vec<Transaction>,
    ) -> Result<(), RejectedTransaction> {
        // Check the whole candidate set against current pool state and
        // against itself before mutating anything, so a rejection never
        // leaves the pool partially updated.
        let mut staged_coins = HashSet::new();
        let mut staged_stakes = HashSet::new();

        for tx in &txns {
            let id = tx.id();
            for input in &tx.coin_inputs {
                if self.spent_coins.contains(&input.parent_id) || !staged_coins.insert(input.parent_id) {
                    return Err(RejectedTransaction { id, reason: PoolError::Conflict(id) });
                }
                if store
                    .coin_output(&input.parent_id)
                    .map_err(|_| RejectedTransaction { id, reason: PoolError::UnknownOutput(id) })?
                    .is_none()
                    && !self.creates_coin_output(&input.parent_id, &txns)
                {
                    return Err(RejectedTransaction { id, reason: PoolError::UnknownOutput(id) });
                }
            }
            for input in &tx.block_stake_inputs {
                if self.spent_stakes.contains(&input.parent_id) || !staged_stakes.insert(input.parent_id) {
                    return Err(RejectedTransaction { id, reason: PoolError::Conflict(id) });
                }
            }
        }

        for tx in txns {
            let id = tx.id();
            for input in &tx.coin_inputs {
                self.spent_coins.insert(input.parent_id);
            }
            for input in &tx.block_stake_inputs {
                self.spent_stakes.insert(input.parent_id);
            }
            self.order.push(id);
            self.by_id.insert(id, tx);
        }
        Ok(())
    }

    /// True if some transaction in `candidates` creates the coin output
    /// `id` refers to, so a chained (dependent) transaction within the
    /// same admitted set is not mistaken for spending an unknown output.
    fn creates_coin_output(&self, id: &CoinOutputId, candidates: &[Transaction]) -> bool {
        let produces = |tx: &Transaction| (0..tx.coin_outputs.len()).any(|i| tx.coin_output_id(i) == *id);
        candidates.iter().any(produces) || self.by_id.values().any(produces)
    }

    /// Returns every pool transaction, ordered so that a transaction
    /// spending another pool transaction's output always follows it.
    pub fn transaction_list(&self) -> Vec<Transaction> {
        let mut produced_by: HashMap<CoinOutputId, TransactionId> = HashMap::new();
        for (id, tx) in &self.by_id {
            for index in 0..tx.coin_outputs.len() {
                produced_by.insert(tx.coin_output_id(index), *id);
            }
        }

        let mut resolved: Vec<TransactionId> = Vec::with_capacity(self.by_id.len());
        let mut done: HashSet<TransactionId> = HashSet::new();

        fn visit(
            id: TransactionId,
            by_id: &HashMap<TransactionId, Transaction>,
            produced_by: &HashMap<CoinOutputId, TransactionId>,
            done: &mut HashSet<TransactionId>,
            resolved: &mut Vec<TransactionId>,
            in_progress: &mut HashSet<TransactionId>,
        ) {
            if done.contains(&id) || !in_progress.insert(id) {
                return;
            }
            if let Some(tx) = by_id.get(&id) {
                for input in &tx.coin_inputs {
                    if let Some(&parent) = produced_by.get(&input.parent_id) {
                        visit(parent, by_id, produced_by, done, resolved, in_progress);
                    }
                }
            }
            in_progress.remove(&id);
            if done.insert(id) {
                resolved.push(id);
            }
        }

        let mut in_progress = HashSet::new();
        for id in &self.order {
            visit(*id, &self.by_id, &produced_by, &mut done, &mut resolved, &mut in_progress);
        }

        resolved.into_iter().filter_map(|id| self.by_id.get(&id).cloned()).collect()
    }

    /// Drops every unconfirmed transaction and spent-output record. The
    /// caller is expected to re-submit known-valid transactions after a
    /// reorg.
    pub fn purge(&mut self) {
        self.by_id.clear();
        self.spent_coins.clear();
        self.spent_stakes.clear();
        self.order.clear();
    }
}

impl TxPool for MempoolTransactionPool {
    fn select_for_block(&mut self, max_txs: usize, max_bytes: usize) -> Vec<Transaction> {
        let mut out = Vec::new();
        let mut bytes = 0usize;
        for tx in self.transaction_list() {
            if out.len() >= max_txs {
                break;
            }
            let size = tx.encode_to_vec().len();
            if bytes + size > max_bytes {
                continue;
            }
            bytes += size;
            out.push(tx);
        }
        out
    }
}

/// A trivial pool that never has anything to offer; useful for demo
/// wiring and tests that want to isolate creator logic from mempool
/// behavior, following the teacher's minimal-stand-in pattern for an
/// external collaborator.
#[derive(Default)]
pub struct EmptyTxPool;

impl TxPool for EmptyTxPool {
    fn select_for_block(&mut self, _max_txs: usize, _max_bytes: usize) -> Vec<Transaction> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::mem::MemoryStateStore;
    use crate::types::currency::Currency;
    use crate::types::transaction::{CoinInput, CoinOutput};
    use crate::types::unlock::{UnlockCondition, UnlockConditionType, UnlockFulfillment, UnlockHash};
    use crate::types::hash::Hash;

    fn nil_tx(fee: u64) -> Transaction {
        Transaction {
            version: crate::types::version::TransactionVersion::default(),
            coin_inputs: vec![],
            coin_outputs: vec![],
            block_stake_inputs: vec![],
            block_stake_outputs: vec![],
            miner_fees: vec![Currency::from_u64(fee)],
            arbitrary_data: vec![],
        }
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let mut pool = MempoolTransactionPool::new();
        assert!(pool.select_for_block(10, 10_000).is_empty());
    }

    #[test]
    fn accepting_disjoint_transactions_admits_them_all() {
        let store = MemoryStateStore::new();
        let mut pool = MempoolTransactionPool::new();
        let txns = vec![nil_tx(1), nil_tx(2)];
        pool.accept_transaction_set(&store, txns).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn conflicting_transactions_in_one_set_are_rejected_as_a_group() {
        let store = MemoryStateStore::new();
        let mut pool = MempoolTransactionPool::new();
        let shared_parent = CoinOutputId(Hash([5u8; 32]));
        let cond = UnlockCondition::UnlockHash(UnlockHash::new(UnlockConditionType::UnlockHash, Hash([1u8; 32])));
        let tx_a = Transaction {
            version: crate::types::version::TransactionVersion::default(),
            coin_inputs: vec![CoinInput { parent_id: shared_parent, fulfillment: UnlockFulfillment::Nil }],
            coin_outputs: vec![CoinOutput { value: Currency::from_u64(1), condition: cond.clone() }],
            block_stake_inputs: vec![],
            block_stake_outputs: vec![],
            miner_fees: vec![Currency::from_u64(1)],
            arbitrary_data: vec![],
        };
        let tx_b = Transaction {
            version: crate::types::version::TransactionVersion::default(),
            coin_inputs: vec![CoinInput { parent_id: shared_parent, fulfillment: UnlockFulfillment::Nil }],
            coin_outputs: vec![CoinOutput { value: Currency::from_u64(2), condition: cond }],
            block_stake_inputs: vec![],
            block_stake_outputs: vec![],
            miner_fees: vec![Currency::from_u64(1)],
            arbitrary_data: vec![],
        };
        let result = pool.accept_transaction_set(&store, vec![tx_a, tx_b]);
        assert!(result.is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn purge_clears_every_admitted_transaction() {
        let store = MemoryStateStore::new();
        let mut pool = MempoolTransactionPool::new();
        pool.accept_transaction_set(&store, vec![nil_tx(1)]).unwrap();
        assert_eq!(pool.len(), 1);
        pool.purge();
        assert!(pool.is_empty());
    }

    #[test]
    fn select_for_block_respects_the_transaction_count_limit() {
        let store = MemoryStateStore::new();
        let mut pool = MempoolTransactionPool::new();
        pool.accept_transaction_set(&store, vec![nil_tx(1), nil_tx(2), nil_tx(3)]).unwrap();
        let selected = pool.select_for_block(2, 1_000_000);
        assert_eq!(selected.len(), 2);
    }
}
