//! Top-level configuration for a PoBS node.
//!
//! This module aggregates configuration for:
//!
//! - consensus parameters (`ConsensusConfig`),
//! - persistent storage (RocksDB path and creation flags),
//! - the block creator (search window, payout condition source),
//! - the metrics exporter (enable flag + listen address).
//!
//! The goal is to have a single `ChainConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, config files,
//! or environment variables as needed.

use std::net::SocketAddr;

use crate::consensus::ConsensusConfig;
use crate::storage::RocksDbConfig;

/// Configuration for the block creator.
#[derive(Clone, Debug)]
pub struct CreatorConfig {
    /// How many seconds ahead of `now` the solver searches for a solving
    /// timestamp before giving up on the current scan.
    pub search_window_secs: u64,
}

impl Default for CreatorConfig {
    fn default() -> Self {
        Self { search_window_secs: 10 }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self { enabled: true, listen_addr: addr }
    }
}

/// Top-level configuration for a PoBS node.
///
/// This aggregates all the sub-configs needed to wire up a typical node:
///
/// - consensus tuning (`consensus`),
/// - persistent storage (`storage`),
/// - block creation (`creator`),
/// - Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    pub consensus: ConsensusConfig,
    pub storage: RocksDbConfig,
    pub creator: CreatorConfig,
    pub metrics: MetricsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_config_builds_without_panicking() {
        let cfg = ChainConfig::default();
        assert!(cfg.metrics.enabled);
        assert!(cfg.creator.search_window_secs > 0);
    }
}
