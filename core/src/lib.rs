//! Core library crate for a Proof-of-Block-Stake node.
//!
//! This crate provides the building blocks for a PoBS validator:
//!
//! - strongly-typed domain types (`types`),
//! - cryptographic primitives (`crypto`),
//! - canonical binary encoding (`encoding`),
//! - a modular consensus engine (`consensus`),
//! - storage backends (`storage`),
//! - an unconfirmed-transaction pool (`txpool`),
//! - a block creation scheduler (`creator`),
//! - the peer-network contract (`gateway`, interface only),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! Higher-level binaries can compose these pieces to build validator
//! nodes, simulators, and experiment harnesses.

pub mod config;
pub mod consensus;
pub mod creator;
pub mod crypto;
pub mod encoding;
pub mod gateway;
pub mod metrics;
pub mod storage;
pub mod txpool;
pub mod types;

// Re-export top-level configuration types.
pub use config::{ChainConfig, CreatorConfig, MetricsConfig};

// Re-export "core" consensus types and traits.
pub use consensus::{
    AcceptAllValidator, BlockIndexEntry, BlockStakeOutputRecord, BlockValidator, ConsensusConfig,
    ConsensusEngine, ConsensusError, DefaultBlockValidator, ForkChoice, HeaviestChainForkChoice,
    ImportOutcome, StateStore, StorageError, TipInfo, TransientError, ValidationError,
};

// Re-export storage backends.
pub use storage::{MemoryStateStore, RocksDbConfig, RocksDbStateStore};

// Re-export the transaction pool and block creator.
pub use creator::{BlockCreator, CreatorState, StakeSource};
pub use txpool::{EmptyTxPool, MempoolTransactionPool, TxPool};

// Re-export the peer-network contract.
pub use gateway::{ChannelGateway, Gateway, NullGateway, PeerInfo};

// Re-export metrics registry and metric groups.
pub use metrics::{ConsensusMetrics, CreatorMetrics, MetricsRegistry, PoolMetrics, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the default fork-choice rule.
pub type DefaultForkChoice = HeaviestChainForkChoice;

/// Type alias for the default persistent store backend.
pub type DefaultStateStore = RocksDbStateStore;

/// Type alias for the default consensus engine stack.
///
/// This uses:
///
/// - [`DefaultStateStore`] (RocksDB),
/// - [`DefaultBlockValidator`] (full structural, signature, and PoBS checks),
/// - [`DefaultForkChoice`] (heaviest accumulated work).
pub type DefaultConsensusEngine = ConsensusEngine<DefaultStateStore, DefaultBlockValidator, DefaultForkChoice>;
