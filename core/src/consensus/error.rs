//! Typed error taxonomy for the consensus layer.
//!
//! [`crate::encoding::FormatError`] covers malformed bytes. The three
//! error types here cover everything above the wire: a block or
//! transaction that is syntactically fine but violates a consensus
//! rule ([`ValidationError`]), a failure to read or write durable state
//! ([`StorageError`]), and conditions that are not the submitter's
//! fault and may resolve on retry ([`TransientError`]) — an orphan
//! block waiting on a parent, or a block whose timestamp is ahead of
//! the local clock but within the future-tolerance window.
//! [`ConsensusError`] is the engine-level umbrella the other three fold
//! into.

use thiserror::Error;

use crate::encoding::FormatError;
use crate::types::block::BlockId;
use crate::types::transaction::{BlockStakeOutputId, CoinOutputId, TransactionId};
use crate::types::version::TransactionVersion;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("block format error: {0}")]
    Format(#[from] FormatError),

    #[error("block {0} has an empty transaction list but empty blocks are disallowed")]
    EmptyBlockDisallowed(BlockId),

    #[error("block {block} exceeds the size limit: {size} > {limit}")]
    BlockTooLarge { block: BlockId, size: u64, limit: u64 },

    #[error("transaction {0} arbitrary_data exceeds the size limit")]
    ArbitraryDataTooLarge(TransactionId),

    #[error("transaction {tx} has version {version}, which is not the baseline version and is not recognized by any registered plugin")]
    UnknownTransactionVersion { tx: TransactionId, version: TransactionVersion },

    #[error("block {block} height {got} does not follow parent height {expected}")]
    WrongHeight { block: BlockId, expected: u64, got: u64 },

    #[error("block {block} timestamp {timestamp} is not after the median of the last {window} blocks")]
    TimestampNotIncreasing { block: BlockId, timestamp: u64, window: u64 },

    #[error("block {block} timestamp {timestamp} is too far in the future (threshold {threshold})")]
    TimestampTooFarInFuture { block: BlockId, timestamp: u64, threshold: u64 },

    #[error("block {block} timestamp {timestamp} exceeds the extreme future threshold {threshold} and cannot be explained by clock skew")]
    TimestampExtremeFuture { block: BlockId, timestamp: u64, threshold: u64 },

    #[error("block {0} proof-of-block-stake hash does not solve the target")]
    PobsTargetNotMet(BlockId),

    #[error("block {0} references a block-stake output that is not yet mature")]
    StakeOutputImmature(BlockId),

    #[error("block {0} references a block-stake output that has not yet aged enough to be used as a stake source")]
    StakeOutputNotAged(BlockId),

    #[error("transaction {0} miner fee is below the minimum required fee")]
    FeeBelowMinimum(TransactionId),

    #[error("block {0} proof-of-block-stake signature does not match the staked output's unlock hash")]
    BadPobsSignature(BlockId),

    #[error("transaction {0} spends an unknown coin output")]
    UnknownCoinOutput(CoinOutputId),

    #[error("transaction {0} spends an unknown block-stake output")]
    UnknownBlockStakeOutput(BlockStakeOutputId),

    #[error("transaction {0} spends output {1} more than once in the same block")]
    DoubleSpend(TransactionId, CoinOutputId),

    #[error("transaction {0} fulfillment does not satisfy its unlock condition")]
    FulfillmentMismatch(TransactionId),

    #[error("transaction {0} is unbalanced: inputs {inputs} != outputs+fees {outputs}")]
    CoinsNotBalanced { tx: TransactionId, inputs: String, outputs: String },

    #[error("transaction {0} block-stake inputs do not balance against outputs")]
    BlockStakesNotBalanced(TransactionId),

    #[error("block {0} miner payouts do not equal the block subsidy plus collected fees")]
    MinerPayoutMismatch(BlockId),

    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("data corruption detected: {0}")]
    Corruption(String),

    #[error("stored schema version {found} is incompatible with the running version {expected}")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error("decode error reading stored value: {0}")]
    Decode(#[from] FormatError),
}

/// A condition that is not a consensus violation and may resolve on its
/// own: the block arrived before its parent, or its timestamp is ahead
/// of the local clock but still within tolerance.
#[derive(Debug, Error)]
pub enum TransientError {
    #[error("block {0} is an orphan: parent not yet known")]
    OrphanBlock(BlockId),

    #[error("block {block} timestamp {timestamp} is ahead of the local clock but within the future-tolerance window")]
    NotYetDue { block: BlockId, timestamp: u64 },
}

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transient(#[from] TransientError),
}
