//! Gateway contract.
//!
//! The core depends only on this interface from an external peer-network
//! component: fire-and-forget broadcast of locally produced blocks and
//! transactions, and inbound channels delivering gossip from peers. No
//! transport is implemented here — peer discovery and connection churn
//! are out of scope — only the contract the consensus engine and block
//! creator consume.

use std::sync::mpsc::{Receiver, Sender};

use crate::types::block::Block;
use crate::types::transaction::Transaction;

/// Observational information about a connected peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub address: String,
}

/// The external peer-network component the core consumes.
///
/// Blocks may be delivered in any order; the consensus engine tolerates
/// orphans by buffering children until their parents arrive.
pub trait Gateway {
    /// Fire-and-forget: announces a locally produced block to peers.
    fn broadcast_block(&self, block: &Block);

    /// Fire-and-forget: announces a locally produced transaction to peers.
    fn broadcast_transaction(&self, txn: &Transaction);

    /// Currently known peers.
    fn peers(&self) -> Vec<PeerInfo>;
}

/// A gateway stand-in that discards every broadcast and reports no
/// peers; useful for single-node demos and tests that want to isolate
/// consensus/creator logic from networking, following the teacher's
/// minimal-stand-in pattern for an external collaborator.
#[derive(Default)]
pub struct NullGateway;

impl Gateway for NullGateway {
    fn broadcast_block(&self, _block: &Block) {}
    fn broadcast_transaction(&self, _txn: &Transaction) {}
    fn peers(&self) -> Vec<PeerInfo> {
        Vec::new()
    }
}

/// A gateway backed by in-process channels: broadcasts are recorded so
/// tests can assert on them, and a paired sender lets a test inject
/// inbound gossip.
pub struct ChannelGateway {
    broadcast_blocks: Sender<Block>,
    broadcast_txns: Sender<Transaction>,
    peers: Vec<PeerInfo>,
}

impl ChannelGateway {
    /// Builds a new channel-backed gateway, returning it alongside the
    /// receiving ends of its broadcast channels.
    pub fn new() -> (Self, Receiver<Block>, Receiver<Transaction>) {
        let (block_tx, block_rx) = std::sync::mpsc::channel();
        let (txn_tx, txn_rx) = std::sync::mpsc::channel();
        (Self { broadcast_blocks: block_tx, broadcast_txns: txn_tx, peers: Vec::new() }, block_rx, txn_rx)
    }

    pub fn with_peers(mut self, peers: Vec<PeerInfo>) -> Self {
        self.peers = peers;
        self
    }
}

impl Gateway for ChannelGateway {
    fn broadcast_block(&self, block: &Block) {
        // A disconnected receiver means nobody is listening; dropping
        // the broadcast is correct for a fire-and-forget contract.
        let _ = self.broadcast_blocks.send(block.clone());
    }

    fn broadcast_transaction(&self, txn: &Transaction) {
        let _ = self.broadcast_txns.send(txn.clone());
    }

    fn peers(&self) -> Vec<PeerInfo> {
        self.peers.clone()
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
        let (_sk, pk) = generate_keypair([1u8; 32]);
        Block {
            header: Header {
                parent_id: BlockId(Hash([0u8; 32])),
                height: 1,
                timestamp: 0,
                pobs: PobsProof {
                    block_stake_output_id: BlockStakeOutputId(Hash([0u8; 32])),
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
    fn null_gateway_reports_no_peers() {
        let gw = NullGateway;
        assert!(gw.peers().is_empty());
        gw.broadcast_block(&sample_block());
    }

    #[test]
    fn channel_gateway_delivers_broadcast_blocks_to_its_receiver() {
        let (gw, rx, _txn_rx) = ChannelGateway::new();
        let block = sample_block();
        gw.broadcast_block(&block);
        let received = rx.recv().unwrap();
        assert_eq!(received.id(), block.id());
    }

    #[test]
    fn channel_gateway_reports_the_configured_peers() {
        let (gw, _rx, _txn_rx) = ChannelGateway::new();
        let gw = gw.with_peers(vec![PeerInfo { address: "127.0.0.1:9000".to_string() }]);
        assert_eq!(gw.peers().len(), 1);
    }
}
