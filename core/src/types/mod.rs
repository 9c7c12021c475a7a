//! Core domain types shared across the consensus layer: hashes and
//! targets, currency, unlock conditions/fulfillments, transactions,
//! blocks, chain indexing, consensus-change notifications, and version
//! identifiers.

pub mod block;
pub mod change;
pub mod currency;
pub mod hash;
pub mod index;
pub mod transaction;
pub mod unlock;
pub mod version;

pub use block::{Block, BlockId, Header, PobsProof};
pub use change::ConsensusChange;
pub use currency::{Currency, CURRENCY_DECIMALS};
pub use hash::{Hash, Target, HASH_LEN};
pub use index::{AccumulatedWork, BlockHeight};
pub use transaction::{
    BlockStakeInput, BlockStakeOutput, BlockStakeOutputId, CoinInput, CoinOutput, CoinOutputId,
    Transaction, TransactionId,
};
pub use unlock::{
    LockTime, UnlockCondition, UnlockConditionType, UnlockFulfillment, UnlockHash,
    LOCKTIME_TIMESTAMP_THRESHOLD,
};
pub use version::{NetworkId, ProtocolVersion, TransactionVersion, PROTOCOL_VERSION};
