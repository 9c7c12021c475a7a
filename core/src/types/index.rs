//! Chain height and accumulated-work types used for indexing and fork
//! choice.

use std::ops::Add;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::encoding::{Cursor, Decode, Encode, FormatError};
use crate::types::hash::Target;

/// A block's position in the chain, genesis at height 0.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    pub const GENESIS: BlockHeight = BlockHeight(0);

    pub fn succ(self) -> BlockHeight {
        BlockHeight(self.0 + 1)
    }

    pub fn checked_sub(self, other: u64) -> Option<BlockHeight> {
        self.0.checked_sub(other).map(BlockHeight)
    }
}

impl std::fmt::Debug for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockHeight({})", self.0)
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for BlockHeight {
    type Output = BlockHeight;
    fn add(self, rhs: u64) -> BlockHeight {
        BlockHeight(self.0 + rhs)
    }
}

impl Encode for BlockHeight {
    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
    }
}

impl Decode for BlockHeight {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(BlockHeight(u64::decode(cur)?))
    }
}

/// Cumulative proof-of-block-stake work, `Σ 2^256 / target_i` over every
/// block on a chain from genesis to its tip. Fork choice picks the chain
/// with the greater accumulated work rather than the greater height,
/// since a PoBS target can vary block to block.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct AccumulatedWork(BigUint);

impl AccumulatedWork {
    pub fn zero() -> Self {
        AccumulatedWork(BigUint::from(0u32))
    }

    /// The work a single block contributes: `2^256 / target`, rounded
    /// down. `target` must be nonzero; a zero target cannot occur for
    /// any block the validator has accepted (the genesis target and
    /// every retargeted child target are clamped away from zero).
    pub fn block_work(target: Target) -> AccumulatedWork {
        let two_pow_256 = BigUint::from(1u32) << 256u32;
        let target_int = target.to_biguint();
        AccumulatedWork(two_pow_256 / target_int)
    }

    pub fn add_block(&self, target: Target) -> AccumulatedWork {
        AccumulatedWork(&self.0 + Self::block_work(target).0)
    }
}

impl Encode for AccumulatedWork {
    fn encode(&self, out: &mut Vec<u8>) {
        crate::encoding::encode_bytes(out, &self.0.to_bytes_be());
    }
}

impl Decode for AccumulatedWork {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        let bytes = crate::encoding::decode_bytes(cur, "AccumulatedWork")?;
        Ok(AccumulatedWork(BigUint::from_bytes_be(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easier_target_contributes_less_work() {
        let hard = Target::from_biguint(&BigUint::from(1_000_000u64));
        let easy = Target::MAX;
        assert!(AccumulatedWork::block_work(hard) > AccumulatedWork::block_work(easy));
    }

    #[test]
    fn accumulated_work_is_monotonic() {
        let mut total = AccumulatedWork::zero();
        total = total.add_block(Target::MAX);
        let after_one = total.clone();
        total = total.add_block(Target::MAX);
        assert!(total > after_one);
    }

    #[test]
    fn block_height_succ_increments() {
        assert_eq!(BlockHeight::GENESIS.succ(), BlockHeight(1));
    }

    #[test]
    fn accumulated_work_roundtrips_through_canonical_bytes() {
        let work = AccumulatedWork::zero().add_block(Target::MAX).add_block(Target::from_biguint(&BigUint::from(7u32)));
        let bytes = work.encode_to_vec();
        let mut cur = Cursor::new(&bytes);
        assert_eq!(AccumulatedWork::decode(&mut cur).unwrap(), work);
    }
}
