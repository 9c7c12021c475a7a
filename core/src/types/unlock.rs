//! Unlock conditions, fulfillments, and the textual/binary `UnlockHash`
//! address format.
//!
//! `UnlockCondition`/`UnlockFulfillment` are tagged sum types dispatched
//! by `match` rather than dynamic dispatch, since the discriminator space
//! is small and known up front. Unknown tags are rejected by the
//! validator (`ConsensusError`), but the discriminator space is left open
//! for a plugin to register a handler for a version the core does not
//! itself know about.

use serde::{Deserialize, Serialize};

use crate::crypto::{self, PublicKey, Signature};
use crate::encoding::{
    decode_bytes, decode_fixed, decode_seq, encode_bytes, encode_fixed, encode_seq, Cursor,
    Decode, Encode, FormatError,
};
use crate::types::hash::{Hash, HASH_LEN};

/// Length of a checksum appended to the textual `UnlockHash` form.
pub const UNLOCK_HASH_CHECKSUM_LEN: usize = 6;
/// Length of the binary `UnlockHash`: 1-byte type tag + 32-byte digest.
pub const UNLOCK_HASH_LEN: usize = 1 + HASH_LEN;
/// Length of the textual `UnlockHash` form in hex characters.
pub const UNLOCK_HASH_TEXT_LEN: usize = 2 + 64 + 12;

/// Discriminator for [`UnlockCondition`]/[`UnlockHash`] variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnlockConditionType {
    Nil = 0,
    UnlockHash = 1,
    TimeLock = 2,
    MultiSignature = 3,
    /// No longer emitted past a network-configured cutover height, but
    /// must remain decodable for historical blocks.
    AtomicSwapLegacy = 4,
}

impl UnlockConditionType {
    fn from_tag(tag: u8) -> Result<Self, FormatError> {
        match tag {
            0 => Ok(Self::Nil),
            1 => Ok(Self::UnlockHash),
            2 => Ok(Self::TimeLock),
            3 => Ok(Self::MultiSignature),
            4 => Ok(Self::AtomicSwapLegacy),
            other => Err(FormatError::UnknownDiscriminator(other, "UnlockConditionType")),
        }
    }
}

/// A 33-byte tagged identifier for a spending condition, with a 78-character
/// hex textual form that appends a checksum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnlockHash {
    pub condition_type: UnlockConditionType,
    pub digest: Hash,
}

impl UnlockHash {
    pub fn new(condition_type: UnlockConditionType, digest: Hash) -> Self {
        Self { condition_type, digest }
    }

    fn checksum(condition_type: UnlockConditionType, digest: &Hash) -> [u8; UNLOCK_HASH_CHECKSUM_LEN] {
        let mut preimage = Vec::with_capacity(1 + HASH_LEN);
        preimage.push(condition_type as u8);
        preimage.extend_from_slice(&digest.0);
        let full = crypto::hash(&preimage);
        let mut out = [0u8; UNLOCK_HASH_CHECKSUM_LEN];
        out.copy_from_slice(&full.0[..UNLOCK_HASH_CHECKSUM_LEN]);
        out
    }

    /// Renders the 78-character textual form: 2 hex tag || 64 hex hash ||
    /// 12 hex checksum over (tag || hash).
    pub fn to_text(&self) -> String {
        let checksum = Self::checksum(self.condition_type, &self.digest);
        format!(
            "{:02x}{}{}",
            self.condition_type as u8,
            hex::encode(self.digest.0),
            hex::encode(checksum)
        )
    }

    pub fn from_text(s: &str) -> Result<Self, FormatError> {
        if s.len() != UNLOCK_HASH_TEXT_LEN {
            return Err(FormatError::BadFixedSize("UnlockHash text", UNLOCK_HASH_TEXT_LEN, s.len()));
        }
        let tag_bytes =
            hex::decode(&s[0..2]).map_err(|_| FormatError::BadFixedSize("UnlockHash tag", 1, 0))?;
        let hash_bytes =
            hex::decode(&s[2..66]).map_err(|_| FormatError::BadFixedSize("UnlockHash digest", HASH_LEN, 0))?;
        let checksum_bytes = hex::decode(&s[66..78])
            .map_err(|_| FormatError::BadFixedSize("UnlockHash checksum", UNLOCK_HASH_CHECKSUM_LEN, 0))?;

        let condition_type = UnlockConditionType::from_tag(tag_bytes[0])?;
        let mut digest = [0u8; HASH_LEN];
        digest.copy_from_slice(&hash_bytes);
        let digest = Hash(digest);

        let expected = Self::checksum(condition_type, &digest);
        if expected.as_slice() != checksum_bytes.as_slice() {
            return Err(FormatError::BadFixedSize("UnlockHash checksum mismatch", 0, 0));
        }

        Ok(UnlockHash { condition_type, digest })
    }
}

impl std::fmt::Debug for UnlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnlockHash({})", self.to_text())
    }
}

impl std::fmt::Display for UnlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl Encode for UnlockHash {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.condition_type as u8);
        encode_fixed(out, &self.digest.0);
    }
}

impl Decode for UnlockHash {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        let tag = u8::decode(cur)?;
        let condition_type = UnlockConditionType::from_tag(tag)?;
        let digest = Hash(decode_fixed::<HASH_LEN>(cur, "UnlockHash digest")?);
        Ok(UnlockHash { condition_type, digest })
    }
}

/// A locktime value is interpreted as a block height below the
/// threshold and as a Unix timestamp at or above it — the same
/// convention as Bitcoin's `nLockTime`/Rivine's `LockTimeMinTimestampValue`.
pub const LOCKTIME_TIMESTAMP_THRESHOLD: u64 = 500_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockTime {
    Height(u64),
    Timestamp(u64),
}

impl LockTime {
    fn raw(self) -> u64 {
        match self {
            LockTime::Height(h) => h,
            LockTime::Timestamp(t) => t,
        }
    }

    fn from_raw(raw: u64) -> Self {
        if raw < LOCKTIME_TIMESTAMP_THRESHOLD {
            LockTime::Height(raw)
        } else {
            LockTime::Timestamp(raw)
        }
    }

    pub fn is_satisfied(self, current_height: u64, current_timestamp: u64) -> bool {
        match self {
            LockTime::Height(h) => current_height >= h,
            LockTime::Timestamp(t) => current_timestamp >= t,
        }
    }
}

impl Encode for LockTime {
    fn encode(&self, out: &mut Vec<u8>) {
        self.raw().encode(out);
    }
}

impl Decode for LockTime {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(LockTime::from_raw(u64::decode(cur)?))
    }
}

/// A spending condition attached to a [`crate::types::transaction::CoinOutput`]
/// or [`crate::types::transaction::BlockStakeOutput`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum UnlockCondition {
    /// Anyone may spend; used only by the genesis allocation and tests.
    Nil,
    /// Spendable by whoever can produce a signature matching `address`.
    UnlockHash(UnlockHash),
    /// Wraps `inner`, additionally requiring `lock` to have elapsed.
    TimeLock { lock: LockTime, inner: Box<UnlockCondition> },
    /// Spendable once at least `min_signatures` of `public_keys` sign.
    MultiSignature {
        min_signatures: u64,
        public_keys: Vec<PublicKey>,
    },
    /// Legacy hash-time-locked-contract condition, historical only.
    AtomicSwapLegacy {
        sender: UnlockHash,
        receiver: UnlockHash,
        hashed_secret: Hash,
        timelock: u64,
    },
}

impl UnlockCondition {
    pub fn condition_type(&self) -> UnlockConditionType {
        match self {
            UnlockCondition::Nil => UnlockConditionType::Nil,
            UnlockCondition::UnlockHash(_) => UnlockConditionType::UnlockHash,
            UnlockCondition::TimeLock { .. } => UnlockConditionType::TimeLock,
            UnlockCondition::MultiSignature { .. } => UnlockConditionType::MultiSignature,
            UnlockCondition::AtomicSwapLegacy { .. } => UnlockConditionType::AtomicSwapLegacy,
        }
    }

    /// Derives the [`UnlockHash`] that identifies this condition, i.e. the
    /// address a counterparty would pay to create an output of this shape.
    pub fn unlock_hash(&self) -> UnlockHash {
        let digest = crypto::hash_object(self);
        UnlockHash::new(self.condition_type(), digest)
    }
}

impl Encode for UnlockCondition {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.condition_type() as u8);
        match self {
            UnlockCondition::Nil => {}
            UnlockCondition::UnlockHash(addr) => addr.encode(out),
            UnlockCondition::TimeLock { lock, inner } => {
                lock.encode(out);
                inner.encode(out);
            }
            UnlockCondition::MultiSignature { min_signatures, public_keys } => {
                min_signatures.encode(out);
                encode_seq(out, &public_keys.iter().map(|k| k.0).collect::<Vec<_>>());
            }
            UnlockCondition::AtomicSwapLegacy { sender, receiver, hashed_secret, timelock } => {
                sender.encode(out);
                receiver.encode(out);
                hashed_secret.encode(out);
                timelock.encode(out);
            }
        }
    }
}

impl Decode for UnlockCondition {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        let tag = u8::decode(cur)?;
        Ok(match UnlockConditionType::from_tag(tag)? {
            UnlockConditionType::Nil => UnlockCondition::Nil,
            UnlockConditionType::UnlockHash => UnlockCondition::UnlockHash(UnlockHash::decode(cur)?),
            UnlockConditionType::TimeLock => {
                let lock = LockTime::decode(cur)?;
                let inner = Box::new(UnlockCondition::decode(cur)?);
                UnlockCondition::TimeLock { lock, inner }
            }
            UnlockConditionType::MultiSignature => {
                let min_signatures = u64::decode(cur)?;
                let raw_keys: Vec<[u8; 32]> = decode_seq(cur, "MultiSignature.public_keys")?;
                let public_keys = raw_keys.into_iter().map(PublicKey).collect();
                UnlockCondition::MultiSignature { min_signatures, public_keys }
            }
            UnlockConditionType::AtomicSwapLegacy => {
                let sender = UnlockHash::decode(cur)?;
                let receiver = UnlockHash::decode(cur)?;
                let hashed_secret = Hash::decode(cur)?;
                let timelock = u64::decode(cur)?;
                UnlockCondition::AtomicSwapLegacy { sender, receiver, hashed_secret, timelock }
            }
        })
    }
}

impl Encode for [u8; 32] {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_fixed(out, self);
    }
}

impl Decode for [u8; 32] {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        decode_fixed::<32>(cur, "[u8; 32]")
    }
}

/// Proof that the spender is entitled to consume an output locked under
/// a matching [`UnlockCondition`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum UnlockFulfillment {
    /// Satisfies [`UnlockCondition::Nil`]; carries no proof.
    Nil,
    /// Satisfies [`UnlockCondition::UnlockHash`] (directly or through a
    /// [`UnlockCondition::TimeLock`] wrapping one).
    Single { public_key: PublicKey, signature: Signature },
    /// Satisfies [`UnlockCondition::MultiSignature`].
    MultiSignature { pairs: Vec<(PublicKey, Signature)> },
    /// Satisfies [`UnlockCondition::AtomicSwapLegacy`]. `secret` is
    /// `Some` on the receiver's redeem path and `None` on the sender's
    /// refund-after-timelock path.
    AtomicSwap {
        public_key: PublicKey,
        signature: Signature,
        secret: Option<[u8; 32]>,
    },
}

impl UnlockFulfillment {
    fn discriminant(&self) -> u8 {
        match self {
            UnlockFulfillment::Nil => 0,
            UnlockFulfillment::Single { .. } => 1,
            UnlockFulfillment::MultiSignature { .. } => 2,
            UnlockFulfillment::AtomicSwap { .. } => 3,
        }
    }
}

impl Encode for UnlockFulfillment {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.discriminant());
        match self {
            UnlockFulfillment::Nil => {}
            UnlockFulfillment::Single { public_key, signature } => {
                encode_fixed(out, &public_key.0);
                encode_fixed(out, &signature.0);
            }
            UnlockFulfillment::MultiSignature { pairs } => {
                (pairs.len() as u64).encode(out);
                for (pk, sig) in pairs {
                    encode_fixed(out, &pk.0);
                    encode_fixed(out, &sig.0);
                }
            }
            UnlockFulfillment::AtomicSwap { public_key, signature, secret } => {
                encode_fixed(out, &public_key.0);
                encode_fixed(out, &signature.0);
                match secret {
                    Some(s) => {
                        out.push(1);
                        encode_fixed(out, s);
                    }
                    None => out.push(0),
                }
            }
        }
    }
}

impl Decode for UnlockFulfillment {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        let tag = u8::decode(cur)?;
        Ok(match tag {
            0 => UnlockFulfillment::Nil,
            1 => {
                let public_key = PublicKey(decode_fixed::<32>(cur, "Single.public_key")?);
                let signature = Signature(decode_fixed::<64>(cur, "Single.signature")?);
                UnlockFulfillment::Single { public_key, signature }
            }
            2 => {
                let len = u64::decode(cur)?;
                let mut pairs = Vec::with_capacity(len.min(4096) as usize);
                for _ in 0..len {
                    let pk = PublicKey(decode_fixed::<32>(cur, "MultiSignature.pair.pk")?);
                    let sig = Signature(decode_fixed::<64>(cur, "MultiSignature.pair.sig")?);
                    pairs.push((pk, sig));
                }
                UnlockFulfillment::MultiSignature { pairs }
            }
            3 => {
                let public_key = PublicKey(decode_fixed::<32>(cur, "AtomicSwap.public_key")?);
                let signature = Signature(decode_fixed::<64>(cur, "AtomicSwap.signature")?);
                let has_secret = u8::decode(cur)?;
                let secret = match has_secret {
                    0 => None,
                    1 => Some(decode_fixed::<32>(cur, "AtomicSwap.secret")?),
                    other => return Err(FormatError::BadFixedSize("AtomicSwap.secret tag", 1, other as usize)),
                };
                UnlockFulfillment::AtomicSwap { public_key, signature, secret }
            }
            other => return Err(FormatError::UnknownDiscriminator(other, "UnlockFulfillment")),
        })
    }
}

/// Parity with [`decode_bytes`]/[`encode_bytes`] for call sites that
/// need raw-byte condition digests (e.g. legacy migration tooling).
pub fn encode_condition_digest(out: &mut Vec<u8>, digest: &[u8]) {
    encode_bytes(out, digest);
}

pub fn decode_condition_digest(cur: &mut Cursor<'_>) -> Result<Vec<u8>, FormatError> {
    decode_bytes(cur, "condition_digest")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_exact;

    #[test]
    fn unlock_hash_text_form_is_78_chars_and_roundtrips() {
        let uh = UnlockHash::new(UnlockConditionType::UnlockHash, Hash([3u8; HASH_LEN]));
        let text = uh.to_text();
        assert_eq!(text.len(), UNLOCK_HASH_TEXT_LEN);
        let back = UnlockHash::from_text(&text).unwrap();
        assert_eq!(uh, back);
    }

    #[test]
    fn unlock_hash_rejects_bad_checksum() {
        let uh = UnlockHash::new(UnlockConditionType::UnlockHash, Hash([3u8; HASH_LEN]));
        let mut text = uh.to_text();
        // Flip the last hex character of the checksum.
        let last = text.pop().unwrap();
        let flipped = if last == '0' { '1' } else { '0' };
        text.push(flipped);
        assert!(UnlockHash::from_text(&text).is_err());
    }

    #[test]
    fn locktime_interprets_small_values_as_height() {
        let lt = LockTime::from_raw(100);
        assert_eq!(lt, LockTime::Height(100));
        assert!(lt.is_satisfied(100, 0));
        assert!(!lt.is_satisfied(99, u64::MAX));
    }

    #[test]
    fn locktime_interprets_large_values_as_timestamp() {
        let lt = LockTime::from_raw(LOCKTIME_TIMESTAMP_THRESHOLD + 10);
        assert_eq!(lt, LockTime::Timestamp(LOCKTIME_TIMESTAMP_THRESHOLD + 10));
        assert!(lt.is_satisfied(0, LOCKTIME_TIMESTAMP_THRESHOLD + 10));
        assert!(!lt.is_satisfied(u64::MAX, LOCKTIME_TIMESTAMP_THRESHOLD + 9));
    }

    #[test]
    fn unlock_condition_roundtrips_through_canonical_bytes() {
        let cond = UnlockCondition::TimeLock {
            lock: LockTime::Height(500),
            inner: Box::new(UnlockCondition::UnlockHash(UnlockHash::new(
                UnlockConditionType::UnlockHash,
                Hash([1u8; HASH_LEN]),
            ))),
        };
        let bytes = cond.encode_to_vec();
        let decoded: UnlockCondition = decode_exact("UnlockCondition", &bytes).unwrap();
        assert_eq!(cond, decoded);
    }

    #[test]
    fn atomic_swap_legacy_decodes_for_historical_compatibility() {
        let cond = UnlockCondition::AtomicSwapLegacy {
            sender: UnlockHash::new(UnlockConditionType::UnlockHash, Hash([1u8; HASH_LEN])),
            receiver: UnlockHash::new(UnlockConditionType::UnlockHash, Hash([2u8; HASH_LEN])),
            hashed_secret: Hash([3u8; HASH_LEN]),
            timelock: 12345,
        };
        let bytes = cond.encode_to_vec();
        let decoded: UnlockCondition = decode_exact("UnlockCondition", &bytes).unwrap();
        assert_eq!(cond, decoded);
    }

    #[test]
    fn different_conditions_produce_different_unlock_hashes() {
        let a = UnlockCondition::UnlockHash(UnlockHash::new(UnlockConditionType::UnlockHash, Hash([1u8; HASH_LEN])));
        let b = UnlockCondition::UnlockHash(UnlockHash::new(UnlockConditionType::UnlockHash, Hash([2u8; HASH_LEN])));
        assert_ne!(a.unlock_hash(), b.unlock_hash());
    }
}
