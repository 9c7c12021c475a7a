//! Blocks, block headers, and the proof-of-block-stake seal.

use serde::{Deserialize, Serialize};

use crate::crypto::{self, PublicKey, Signature};
use crate::encoding::{decode_seq, encode_seq, Cursor, Decode, Encode, FormatError};
use crate::types::hash::Hash;
use crate::types::transaction::{BlockStakeOutputId, CoinOutput, CoinOutputId, Transaction};

/// Domain-separation specifier for deriving the id a miner payout output
/// gets, mirroring how [`Transaction::coin_output_id`] derives ids for
/// ordinary transaction outputs but scoped to the block rather than a
/// transaction (miner payouts are not carried by any transaction).
const MINER_PAYOUT_SPECIFIER: &[u8] = b"miner payout\0\0\0\0";

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct BlockId(pub Hash);

impl std::fmt::Debug for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encode for BlockId {
    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
    }
}

impl Decode for BlockId {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(BlockId(Hash::decode(cur)?))
    }
}

/// The proof-of-block-stake seal: identifies the block-stake output
/// being spent to claim the right to propose this block, the location
/// at which that output was originally created (its "age", used as
/// part of the lottery preimage), and the signature proving ownership
/// of the output's unlock hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PobsProof {
    pub block_stake_output_id: BlockStakeOutputId,
    pub creation_block_height: u64,
    pub creation_tx_index: u64,
    pub creation_output_index: u64,
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl PobsProof {
    /// `H(stake_modifier ‖ creation_block_height ‖ creation_tx_index ‖
    /// creation_output_index ‖ timestamp)`, the value compared against
    /// `stake_value * target` to determine whether this seal solves the
    /// lottery for the candidate block carrying `timestamp`.
    pub fn pobs_hash(&self, stake_modifier: Hash, timestamp: u64) -> Hash {
        let mut buf = Vec::new();
        stake_modifier.encode(&mut buf);
        self.creation_block_height.encode(&mut buf);
        self.creation_tx_index.encode(&mut buf);
        self.creation_output_index.encode(&mut buf);
        timestamp.encode(&mut buf);
        crypto::hash(&buf)
    }
}

impl Encode for PobsProof {
    fn encode(&self, out: &mut Vec<u8>) {
        self.block_stake_output_id.encode(out);
        self.creation_block_height.encode(out);
        self.creation_tx_index.encode(out);
        self.creation_output_index.encode(out);
        crate::encoding::encode_fixed(out, &self.public_key.0);
        crate::encoding::encode_fixed(out, &self.signature.0);
    }
}

impl Decode for PobsProof {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(PobsProof {
            block_stake_output_id: BlockStakeOutputId::decode(cur)?,
            creation_block_height: u64::decode(cur)?,
            creation_tx_index: u64::decode(cur)?,
            creation_output_index: u64::decode(cur)?,
            public_key: PublicKey(crate::encoding::decode_fixed::<32>(cur, "PobsProof.public_key")?),
            signature: Signature(crate::encoding::decode_fixed::<64>(cur, "PobsProof.signature")?),
        })
    }
}

/// Block header: everything needed to link, order, and seal a block,
/// excluding the transaction payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Header {
    pub parent_id: BlockId,
    pub height: u64,
    pub timestamp: u64,
    pub pobs: PobsProof,
}

impl Header {
    /// The digest the PoBS signature is computed over: every header
    /// field except the signature itself, which obviously cannot sign
    /// its own bytes.
    pub fn signing_digest(&self) -> Hash {
        let mut buf = Vec::new();
        self.parent_id.encode(&mut buf);
        self.height.encode(&mut buf);
        self.timestamp.encode(&mut buf);
        self.pobs.block_stake_output_id.encode(&mut buf);
        self.pobs.creation_block_height.encode(&mut buf);
        self.pobs.creation_tx_index.encode(&mut buf);
        self.pobs.creation_output_index.encode(&mut buf);
        crate::encoding::encode_fixed(&mut buf, &self.pobs.public_key.0);
        crypto::hash(&buf)
    }
}

impl Encode for Header {
    fn encode(&self, out: &mut Vec<u8>) {
        self.parent_id.encode(out);
        self.height.encode(out);
        self.timestamp.encode(out);
        self.pobs.encode(out);
    }
}

impl Decode for Header {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(Header {
            parent_id: BlockId::decode(cur)?,
            height: u64::decode(cur)?,
            timestamp: u64::decode(cur)?,
            pobs: PobsProof::decode(cur)?,
        })
    }
}

/// A block: a header plus the miner payouts it creates (block subsidy
/// and aggregated transaction fees, subject to the maturity delay) and
/// the ordered list of transactions it includes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub miner_payouts: Vec<CoinOutput>,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Returns the canonical byte representation of this block. All
    /// hashing and signing that need "the bytes of a block" go through
    /// this method, so the format never drifts between call sites.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn id(&self) -> BlockId {
        BlockId(crypto::hash(&self.canonical_bytes()))
    }

    /// Root of a binary Merkle tree over transaction ids, duplicating the
    /// final node at each level when the level has odd length (matching
    /// the common Bitcoin-style construction, including its well-known
    /// duplicate-subtree quirk — validators must apply the identical rule
    /// or they will compute different roots for the same block).
    pub fn merkle_root(&self) -> Hash {
        if self.transactions.is_empty() {
            return Hash::ZERO;
        }
        let mut level: Vec<Hash> = self.transactions.iter().map(|tx| tx.id().0).collect();
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(*level.last().unwrap());
            }
            level = level
                .chunks(2)
                .map(|pair| {
                    let mut buf = Vec::new();
                    pair[0].encode(&mut buf);
                    pair[1].encode(&mut buf);
                    crypto::hash(&buf)
                })
                .collect();
        }
        level[0]
    }

    pub fn total_miner_payout(&self) -> crate::types::currency::Currency {
        self.miner_payouts.iter().map(|o| o.value.clone()).sum()
    }

    pub fn total_fees(&self) -> crate::types::currency::Currency {
        self.transactions.iter().flat_map(|tx| tx.miner_fees.iter().cloned()).sum()
    }

    /// The id `miner_payouts[index]` gets once this block is accepted.
    pub fn miner_payout_id(&self, index: usize) -> CoinOutputId {
        let mut buf = Vec::new();
        crate::encoding::encode_fixed(&mut buf, MINER_PAYOUT_SPECIFIER);
        self.id().0.encode(&mut buf);
        (index as u64).encode(&mut buf);
        CoinOutputId(crypto::hash(&buf))
    }
}

impl Encode for Block {
    fn encode(&self, out: &mut Vec<u8>) {
        self.header.encode(out);
        encode_seq(out, &self.miner_payouts);
        encode_seq(out, &self.transactions);
    }
}

impl Decode for Block {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(Block {
            header: Header::decode(cur)?,
            miner_payouts: decode_seq(cur, "Block.miner_payouts")?,
            transactions: decode_seq(cur, "Block.transactions")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;
    use crate::types::currency::Currency;
    use crate::types::transaction::{BlockStakeOutputId, CoinInput, CoinOutputId};
    use crate::types::unlock::{UnlockCondition, UnlockConditionType, UnlockFulfillment, UnlockHash};

    fn sample_block(n_txs: usize) -> Block {
        let (_sk, pk) = generate_keypair([3u8; 32]);
        let header = Header {
            parent_id: BlockId(Hash([1u8; 32])),
            height: 10,
            timestamp: 1_700_000_000,
            pobs: PobsProof {
                block_stake_output_id: BlockStakeOutputId(Hash([2u8; 32])),
                creation_block_height: 1,
                creation_tx_index: 0,
                creation_output_index: 0,
                public_key: pk,
                signature: Signature([0u8; 64]),
            },
        };
        let transactions = (0..n_txs)
            .map(|i| Transaction {
                version: crate::types::version::TransactionVersion::default(),
                coin_inputs: vec![CoinInput {
                    parent_id: CoinOutputId(Hash([i as u8; 32])),
                    fulfillment: UnlockFulfillment::Nil,
                }],
                coin_outputs: vec![CoinOutput {
                    value: Currency::from_u64(1),
                    condition: UnlockCondition::UnlockHash(UnlockHash::new(
                        UnlockConditionType::UnlockHash,
                        Hash([9u8; 32]),
                    )),
                }],
                block_stake_inputs: vec![],
                block_stake_outputs: vec![],
                miner_fees: vec![Currency::from_u64(1)],
                arbitrary_data: vec![],
            })
            .collect();
        Block { header, miner_payouts: vec![], transactions }
    }

    #[test]
    fn block_id_is_deterministic() {
        let b = sample_block(2);
        assert_eq!(b.id(), b.id());
    }

    #[test]
    fn different_transactions_change_the_block_id() {
        let a = sample_block(1);
        let b = sample_block(2);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn merkle_root_of_empty_block_is_zero() {
        let b = sample_block(0);
        assert_eq!(b.merkle_root(), Hash::ZERO);
    }

    #[test]
    fn merkle_root_handles_odd_transaction_count() {
        let b = sample_block(3);
        // Just exercise the duplicate-last-node path without panicking
        // and check it is deterministic.
        assert_eq!(b.merkle_root(), b.merkle_root());
    }

    #[test]
    fn pobs_hash_changes_with_stake_modifier() {
        let b = sample_block(1);
        let h1 = b.header.pobs.pobs_hash(Hash([1u8; 32]), b.header.timestamp);
        let h2 = b.header.pobs.pobs_hash(Hash([2u8; 32]), b.header.timestamp);
        assert_ne!(h1, h2);
    }

    #[test]
    fn miner_payout_id_differs_by_index() {
        let b = sample_block(0);
        assert_ne!(b.miner_payout_id(0), b.miner_payout_id(1));
    }

    #[test]
    fn block_roundtrips_through_canonical_bytes() {
        let b = sample_block(2);
        let bytes = b.canonical_bytes();
        let decoded = crate::encoding::decode_exact::<Block>("Block", &bytes).unwrap();
        assert_eq!(b.id(), decoded.id());
    }
}
