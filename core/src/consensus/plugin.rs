//! Plugin extension points (§4.4's "Plugin extension points").
//!
//! A plugin observes every block the engine applies or reverts, running
//! inline on the single writer thread so it sees state changes in the
//! exact order consensus committed them, with no separate
//! subscriber-lag window to reason about. Plugins are for derived
//! indexes (an explorer's address index, a wallet's balance cache) —
//! they must not themselves be a source of consensus truth.

use crate::types::block::Block;
use crate::types::version::TransactionVersion;

use super::error::ConsensusError;
use super::store::StateStore;

pub trait ConsensusPlugin: Send {
    /// Called once when the engine starts, after the store is open but
    /// before any block is applied in this run.
    fn init(&mut self, _store: &dyn StateStore) -> Result<(), ConsensusError> {
        Ok(())
    }

    /// Non-baseline transaction versions this plugin extends the core
    /// with (§4.4: "Plugins may veto admission of transactions of
    /// unknown versions" — a plugin registers the versions it
    /// recognizes; anything neither baseline nor registered by any
    /// plugin is rejected). Queried once at engine construction time,
    /// after [`Self::init`], and folded into
    /// [`super::config::ConsensusConfig::accepted_transaction_versions`].
    fn supported_transaction_versions(&self) -> Vec<TransactionVersion> {
        Vec::new()
    }

    /// Called synchronously after the engine persists `block` as part
    /// of an extension or reorg. Must not be used to veto the block:
    /// by the time this runs, `apply_block` has already committed.
    fn apply(&mut self, block: &Block) -> Result<(), ConsensusError>;

    /// Called synchronously when `block` is removed from the canonical
    /// chain by a reorg, in the same order `apply` saw it reverted.
    fn revert(&mut self, block: &Block) -> Result<(), ConsensusError>;

    /// Called once when the engine shuts down cleanly.
    fn close(&mut self) -> Result<(), ConsensusError> {
        Ok(())
    }
}

/// A plugin that does nothing; the default when no extensions are
/// configured.
#[derive(Default)]
pub struct NoopPlugin;

impl ConsensusPlugin for NoopPlugin {
    fn apply(&mut self, _block: &Block) -> Result<(), ConsensusError> {
        Ok(())
    }

    fn revert(&mut self, _block: &Block) -> Result<(), ConsensusError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;
    use crate::types::block::{BlockId, Header, PobsProof};
    use crate::types::hash::Hash;
    use crate::types::transaction::BlockStakeOutputId;

    fn sample_block() -> Block {
        let (_sk, pk) = generate_keypair([5u8; 32]);
        Block {
            header: Header {
                parent_id: BlockId(Hash([1u8; 32])),
                height: 1,
                timestamp: 1,
                pobs: PobsProof {
                    block_stake_output_id: BlockStakeOutputId(Hash([2u8; 32])),
                    creation_block_height: 0,
                    creation_tx_index: 0,
                    creation_output_index: 0,
                    public_key: pk,
                    signature: crate::crypto::Signature([0u8; 64]),
                },
            },
            miner_payouts: vec![],
            transactions: vec![],
        }
    }

    #[test]
    fn noop_plugin_never_errors() {
        let mut plugin = NoopPlugin;
        let block = sample_block();
        assert!(plugin.apply(&block).is_ok());
        assert!(plugin.revert(&block).is_ok());
        assert!(plugin.close().is_ok());
    }

    #[test]
    fn default_supported_transaction_versions_is_empty() {
        assert!(NoopPlugin.supported_transaction_versions().is_empty());
    }
}
