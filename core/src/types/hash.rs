//! 256-bit hash and difficulty-target types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::encoding::{decode_fixed, encode_fixed, Cursor, Decode, Encode, FormatError};

/// Length in bytes of a BLAKE2b-256 digest.
pub const HASH_LEN: usize = 32;

/// A 32-byte BLAKE2b-256 digest, used as a block ID, transaction ID,
/// output ID, and as the generic content-hash type throughout the crate.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        if bytes.len() != HASH_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Hash(arr))
    }
}

impl Encode for Hash {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_fixed(out, &self.0);
    }
}

impl Decode for Hash {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(Hash(decode_fixed::<HASH_LEN>(cur, "Hash")?))
    }
}

/// A 256-bit unsigned difficulty ceiling. A PoBS hash is solved when its
/// big-endian integer value, divided by the stake value, is strictly
/// less than the current target.
///
/// Stored big-endian so two targets can be compared with ordinary byte
/// (lexicographic) comparison, matching big-endian integer ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target(pub [u8; HASH_LEN]);

impl Target {
    /// The loosest possible target: every hash solves it immediately.
    pub const MAX: Target = Target([0xff; HASH_LEN]);

    pub fn to_biguint(self) -> num_bigint::BigUint {
        num_bigint::BigUint::from_bytes_be(&self.0)
    }

    pub fn from_biguint(value: &num_bigint::BigUint) -> Target {
        let bytes = value.to_bytes_be();
        if bytes.len() > HASH_LEN {
            // Saturate rather than silently truncate high-order bytes.
            return Target::MAX;
        }
        let mut out = [0u8; HASH_LEN];
        out[HASH_LEN - bytes.len()..].copy_from_slice(&bytes);
        Target(out)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", hex::encode(self.0))
    }
}

impl Encode for Target {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_fixed(out, &self.0);
    }
}

impl Decode for Target {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(Target(decode_fixed::<HASH_LEN>(cur, "Target")?))
    }
}
