//! Storage backends implementing [`crate::consensus::store::StateStore`].
//!
//! - [`mem::MemoryStateStore`]: an in-memory backend for tests and
//!   short-lived devnets.
//! - [`rocksdb::RocksDbStateStore`]: a persistent backend for long-running
//!   nodes, one column family per index the engine needs.

pub mod mem;
pub mod rocksdb;

pub use mem::MemoryStateStore;
pub use rocksdb::{RocksDbConfig, RocksDbStateStore};
