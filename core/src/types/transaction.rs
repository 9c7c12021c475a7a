//! Transactions: coin/block-stake inputs and outputs, transaction IDs,
//! and the signature digest used to authorize spending.

use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::encoding::{decode_seq, encode_seq, Cursor, Decode, Encode, FormatError};
use crate::types::currency::Currency;
use crate::types::hash::Hash;
use crate::types::unlock::{UnlockCondition, UnlockFulfillment};
use crate::types::version::TransactionVersion;

/// Domain-separation prefixes mixed into output-id hashes so that a coin
/// output and a block-stake output created by the same transaction at
/// the same index never collide, and so that the id of an output
/// depends on where in the transaction it was created rather than only
/// on its value/condition.
const COIN_OUTPUT_SPECIFIER: &[u8] = b"coin output\0\0\0\0\0";
const BLOCKSTAKE_OUTPUT_SPECIFIER: &[u8] = b"blockstake output\0";

macro_rules! hash_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
        pub struct $name(pub Hash);

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Encode for $name {
            fn encode(&self, out: &mut Vec<u8>) {
                self.0.encode(out);
            }
        }

        impl Decode for $name {
            fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
                Ok($name(Hash::decode(cur)?))
            }
        }
    };
}

hash_newtype!(TransactionId);
hash_newtype!(CoinOutputId);
hash_newtype!(BlockStakeOutputId);

/// A spendable coin output: `value` base units locked under `condition`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoinOutput {
    pub value: Currency,
    pub condition: UnlockCondition,
}

impl Encode for CoinOutput {
    fn encode(&self, out: &mut Vec<u8>) {
        self.value.encode(out);
        self.condition.encode(out);
    }
}

impl Decode for CoinOutput {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(CoinOutput { value: Currency::decode(cur)?, condition: UnlockCondition::decode(cur)? })
    }
}

/// A spendable block-stake output, the unit staked in PoBS block
/// creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockStakeOutput {
    pub value: Currency,
    pub condition: UnlockCondition,
}

impl Encode for BlockStakeOutput {
    fn encode(&self, out: &mut Vec<u8>) {
        self.value.encode(out);
        self.condition.encode(out);
    }
}

impl Decode for BlockStakeOutput {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(BlockStakeOutput { value: Currency::decode(cur)?, condition: UnlockCondition::decode(cur)? })
    }
}

/// Consumes a previously created [`CoinOutput`], proving the right to
/// spend it with `fulfillment`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoinInput {
    pub parent_id: CoinOutputId,
    pub fulfillment: UnlockFulfillment,
}

impl Encode for CoinInput {
    fn encode(&self, out: &mut Vec<u8>) {
        self.parent_id.encode(out);
        self.fulfillment.encode(out);
    }
}

impl Decode for CoinInput {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(CoinInput { parent_id: CoinOutputId::decode(cur)?, fulfillment: UnlockFulfillment::decode(cur)? })
    }
}

/// Consumes a previously created [`BlockStakeOutput`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockStakeInput {
    pub parent_id: BlockStakeOutputId,
    pub fulfillment: UnlockFulfillment,
}

impl Encode for BlockStakeInput {
    fn encode(&self, out: &mut Vec<u8>) {
        self.parent_id.encode(out);
        self.fulfillment.encode(out);
    }
}

impl Decode for BlockStakeInput {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(BlockStakeInput { parent_id: BlockStakeOutputId::decode(cur)?, fulfillment: UnlockFulfillment::decode(cur)? })
    }
}

/// A transaction: consumes coin/block-stake inputs, creates coin/
/// block-stake outputs, and pays the difference (inputs minus outputs)
/// as miner fees. Balance is enforced by the validator, not this type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// 1-byte discriminator (§6). [`TransactionVersion::BASELINE`] is
    /// the shape every node accepts; other values are rejected by the
    /// validator unless a registered plugin claims support for them.
    pub version: TransactionVersion,
    pub coin_inputs: Vec<CoinInput>,
    pub coin_outputs: Vec<CoinOutput>,
    pub block_stake_inputs: Vec<BlockStakeInput>,
    pub block_stake_outputs: Vec<BlockStakeOutput>,
    pub miner_fees: Vec<Currency>,
    /// Free-form payload (e.g. a memo); bounded by the consensus
    /// `ArbitraryDataSizeLimit` rather than by this type.
    pub arbitrary_data: Vec<u8>,
}

impl Transaction {
    /// Canonical transaction id: the hash of the full canonical encoding,
    /// fulfillments included. Distinct from [`Transaction::sig_hash`],
    /// which a fulfillment's signature is computed over.
    pub fn id(&self) -> TransactionId {
        TransactionId(crypto::hash_object(self))
    }

    /// The id a coin output gets once this transaction is accepted,
    /// derived from this transaction's id, the output's position, and a
    /// domain-separation specifier.
    pub fn coin_output_id(&self, index: usize) -> CoinOutputId {
        CoinOutputId(output_id(COIN_OUTPUT_SPECIFIER, &self.id(), index))
    }

    /// The id a block-stake output gets once this transaction is accepted.
    pub fn block_stake_output_id(&self, index: usize) -> BlockStakeOutputId {
        BlockStakeOutputId(output_id(BLOCKSTAKE_OUTPUT_SPECIFIER, &self.id(), index))
    }

    /// The digest a fulfillment for input `input_index` must sign: every
    /// field of the transaction except the fulfillments themselves, plus
    /// the index of the input being authorized. Binding the index
    /// prevents one input's fulfillment from being replayed against
    /// another input of the same transaction.
    pub fn sig_hash(&self, input_index: u64) -> Hash {
        let mut buf = Vec::new();
        self.version.encode(&mut buf);
        encode_seq(&mut buf, &self.coin_inputs.iter().map(|i| i.parent_id).collect::<Vec<_>>());
        encode_seq(&mut buf, &self.coin_outputs);
        encode_seq(&mut buf, &self.block_stake_inputs.iter().map(|i| i.parent_id).collect::<Vec<_>>());
        encode_seq(&mut buf, &self.block_stake_outputs);
        encode_seq(&mut buf, &self.miner_fees);
        crate::encoding::encode_bytes(&mut buf, &self.arbitrary_data);
        input_index.encode(&mut buf);
        crypto::hash(&buf)
    }

    /// Sum of all outputs created plus fees paid; the half of the
    /// balance equation the validator compares against input value.
    pub fn coin_outputs_plus_fees(&self) -> Currency {
        let outputs: Currency = self.coin_outputs.iter().map(|o| o.value.clone()).sum();
        let fees: Currency = self.miner_fees.iter().cloned().sum();
        outputs.checked_add(&fees)
    }

    pub fn block_stake_outputs_sum(&self) -> Currency {
        self.block_stake_outputs.iter().map(|o| o.value.clone()).sum()
    }
}

fn output_id(specifier: &[u8], tx_id: &TransactionId, index: usize) -> Hash {
    let mut buf = Vec::new();
    crate::encoding::encode_fixed(&mut buf, specifier);
    tx_id.0.encode(&mut buf);
    (index as u64).encode(&mut buf);
    crypto::hash(&buf)
}

impl Encode for Transaction {
    fn encode(&self, out: &mut Vec<u8>) {
        self.version.encode(out);
        encode_seq(out, &self.coin_inputs);
        encode_seq(out, &self.coin_outputs);
        encode_seq(out, &self.block_stake_inputs);
        encode_seq(out, &self.block_stake_outputs);
        encode_seq(out, &self.miner_fees);
        crate::encoding::encode_bytes(out, &self.arbitrary_data);
    }
}

impl Decode for Transaction {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(Transaction {
            version: TransactionVersion::decode(cur)?,
            coin_inputs: decode_seq(cur, "Transaction.coin_inputs")?,
            coin_outputs: decode_seq(cur, "Transaction.coin_outputs")?,
            block_stake_inputs: decode_seq(cur, "Transaction.block_stake_inputs")?,
            block_stake_outputs: decode_seq(cur, "Transaction.block_stake_outputs")?,
            miner_fees: decode_seq(cur, "Transaction.miner_fees")?,
            arbitrary_data: crate::encoding::decode_bytes(cur, "Transaction.arbitrary_data")?,
        })
    }
}
