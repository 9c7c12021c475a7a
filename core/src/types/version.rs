//! Protocol and chain identifiers carried in the genesis block and in
//! peer handshakes, and the transaction-version discriminator that
//! gates which transaction shapes a node will accept.

use serde::{Deserialize, Serialize};

use crate::encoding::{Cursor, Decode, Encode, FormatError};

/// Wire-format version of this consensus implementation (§6): 4-byte
/// packed semver, an 8-byte prerelease tag, and 4 reserved bytes, fixed
/// at 16 bytes total so it can be compared byte-for-byte in a
/// handshake without a length prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub build: u8,
    /// ASCII prerelease tag (e.g. `b"alpha\0\0\0"`), NUL-padded to 8
    /// bytes; all-zero for a release build.
    pub prerelease: [u8; 8],
}

/// The version this implementation speaks. Bumped whenever the
/// canonical encoding rules in `encoding` change in a
/// non-backwards-compatible way.
pub const PROTOCOL_VERSION: ProtocolVersion =
    ProtocolVersion { major: 1, minor: 0, patch: 0, build: 0, prerelease: [0; 8] };

impl ProtocolVersion {
    pub const ENCODED_LEN: usize = 16;

    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0] = self.major;
        out[1] = self.minor;
        out[2] = self.patch;
        out[3] = self.build;
        out[4..12].copy_from_slice(&self.prerelease);
        // out[12..16] reserved, left zero.
        out
    }

    pub fn from_bytes(bytes: [u8; Self::ENCODED_LEN]) -> Self {
        let mut prerelease = [0u8; 8];
        prerelease.copy_from_slice(&bytes[4..12]);
        ProtocolVersion { major: bytes[0], minor: bytes[1], patch: bytes[2], build: bytes[3], prerelease }
    }

    /// Two nodes may interoperate iff their major versions match;
    /// minor/patch/build carry backwards-compatible additions only.
    pub fn compatible_with(&self, other: &ProtocolVersion) -> bool {
        self.major == other.major
    }
}

impl Encode for ProtocolVersion {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_bytes());
    }
}

impl Decode for ProtocolVersion {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        let bytes = crate::encoding::decode_fixed::<{ Self::ENCODED_LEN }>(cur, "ProtocolVersion")?;
        Ok(Self::from_bytes(bytes))
    }
}

/// Identifies which network a block belongs to (mainnet, a testnet, a
/// local devnet), so two differently-configured nodes never accept each
/// other's blocks even if their genesis blocks happen to collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub u32);

impl NetworkId {
    pub const MAINNET: NetworkId = NetworkId(1);
    pub const TESTNET: NetworkId = NetworkId(2);
    pub const DEVNET: NetworkId = NetworkId(3);
}

impl Encode for NetworkId {
    fn encode(&self, out: &mut Vec<u8>) {
        (self.0 as u64).encode(out);
    }
}

impl Decode for NetworkId {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        let raw = u64::decode(cur)?;
        Ok(NetworkId(raw as u32))
    }
}

/// 1-byte transaction-version discriminator (§6). Version 0 is the
/// baseline shape every node accepts; other values are rejected by
/// [`crate::consensus::validator`] unless a registered
/// [`crate::consensus::plugin::ConsensusPlugin`] claims support for
/// them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionVersion(pub u8);

impl TransactionVersion {
    pub const BASELINE: TransactionVersion = TransactionVersion(0);

    pub fn is_baseline(&self) -> bool {
        *self == Self::BASELINE
    }
}

impl Default for TransactionVersion {
    fn default() -> Self {
        Self::BASELINE
    }
}

impl std::fmt::Display for TransactionVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encode for TransactionVersion {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.0);
    }
}

impl Decode for TransactionVersion {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(TransactionVersion(u8::decode(cur)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_ids_are_distinct() {
        assert_ne!(NetworkId::MAINNET, NetworkId::TESTNET);
        assert_ne!(NetworkId::TESTNET, NetworkId::DEVNET);
    }

    #[test]
    fn protocol_version_round_trips_through_16_bytes() {
        let v = ProtocolVersion { major: 2, minor: 3, patch: 4, build: 5, prerelease: *b"rc1\0\0\0\0\0" };
        let bytes = v.to_bytes();
        assert_eq!(bytes.len(), ProtocolVersion::ENCODED_LEN);
        assert_eq!(ProtocolVersion::from_bytes(bytes), v);
    }

    #[test]
    fn protocol_versions_compatible_iff_major_matches() {
        let a = ProtocolVersion { major: 1, minor: 0, patch: 0, build: 0, prerelease: [0; 8] };
        let b = ProtocolVersion { major: 1, minor: 4, patch: 0, build: 0, prerelease: [0; 8] };
        let c = ProtocolVersion { major: 2, minor: 0, patch: 0, build: 0, prerelease: [0; 8] };
        assert!(a.compatible_with(&b));
        assert!(!a.compatible_with(&c));
    }

    #[test]
    fn baseline_transaction_version_is_default() {
        assert_eq!(TransactionVersion::default(), TransactionVersion::BASELINE);
        assert!(TransactionVersion::BASELINE.is_baseline());
        assert!(!TransactionVersion(7).is_baseline());
    }
}
