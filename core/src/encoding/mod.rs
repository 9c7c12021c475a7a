//! Canonical binary encoding.
//!
//! This is the sole basis for hashing and signing: every entity that
//! participates in a block or transaction hash implements [`Encode`]/
//! [`Decode`] against the rules fixed here, rather than relying on a
//! general-purpose serde binary format. A generic derive cannot express
//! the mixed-width rules the wire format needs (big-endian `Currency`,
//! single-byte sum-type discriminators, 8-byte length-prefixed sequences
//! next to fixed-width integers), so the primitives below are hand
//! written and every domain type composes them explicitly, the same way
//! `Block::canonical_bytes` built its own encoding instead of deriving
//! one.
//!
//! A parallel `serde::{Serialize, Deserialize}` derive is kept on every
//! entity for the external JSON surface; it has no bearing on hashing.

use std::fmt;

/// Error returned when canonical bytes cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unexpected end of input while decoding {0}")]
    UnexpectedEof(&'static str),
    #[error("length prefix {len} for {field} exceeds the {limit} byte sanity bound")]
    LengthOutOfBounds {
        field: &'static str,
        len: u64,
        limit: u64,
    },
    #[error("unknown discriminator {0:#x} for {1}")]
    UnknownDiscriminator(u8, &'static str),
    #[error("{0} must be exactly {1} bytes, got {2}")]
    BadFixedSize(&'static str, usize, usize),
    #[error("trailing bytes after decoding {0}: {1} unread")]
    TrailingBytes(&'static str, usize),
    #[error("arbitrary_data exceeds {limit} bytes (got {got})")]
    ArbitraryDataTooLarge { limit: usize, got: usize },
}

/// A sanity bound on any single length-prefixed field, independent of
/// the consensus `BlockSizeLimit`. Guards against decoding a hostile
/// 2^64-byte length prefix into an allocation.
pub const MAX_DECODE_LEN: u64 = 64 * 1024 * 1024;

/// Types that have a canonical binary representation.
pub trait Encode {
    fn encode(&self, out: &mut Vec<u8>);

    /// Convenience: encode into a fresh buffer.
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

/// Types decodable from canonical bytes.
pub trait Decode: Sized {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError>;
}

/// A cursor over an immutable byte slice used while decoding.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], FormatError> {
        if self.remaining() < n {
            return Err(FormatError::UnexpectedEof(what));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Fails if any bytes remain. Call at the top level after decoding a
    /// complete entity from a standalone buffer (e.g. a stored block).
    pub fn expect_exhausted(&self, what: &'static str) -> Result<(), FormatError> {
        if self.remaining() != 0 {
            return Err(FormatError::TrailingBytes(what, self.remaining()));
        }
        Ok(())
    }
}

/// Decodes `T` from a standalone buffer, requiring the whole buffer to
/// be consumed.
pub fn decode_exact<T: Decode>(what: &'static str, bytes: &[u8]) -> Result<T, FormatError> {
    let mut cur = Cursor::new(bytes);
    let value = T::decode(&mut cur)?;
    cur.expect_exhausted(what)?;
    Ok(value)
}

// ---------------------------------------------------------------------
// Fixed-width integers and booleans (§4.2: "Integers: fixed little-endian,
// 8 bytes"; "Booleans: 1 byte, {0,1}").
// ---------------------------------------------------------------------

impl Encode for u64 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u64 {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        let bytes = cur.take(8, "u64")?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(arr))
    }
}

impl Encode for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(if *self { 1 } else { 0 });
    }
}

impl Decode for bool {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        match cur.take(1, "bool")?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(FormatError::BadFixedSize("bool", 1, other as usize)),
        }
    }
}

impl Encode for u8 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl Decode for u8 {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        Ok(cur.take(1, "u8")?[0])
    }
}

// ---------------------------------------------------------------------
// Variable-length byte strings: 8-byte little-endian length prefix, then
// the raw bytes.
// ---------------------------------------------------------------------

pub fn encode_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    (bytes.len() as u64).encode(out);
    out.extend_from_slice(bytes);
}

pub fn decode_bytes(cur: &mut Cursor<'_>, field: &'static str) -> Result<Vec<u8>, FormatError> {
    let len = u64::decode(cur)?;
    if len > MAX_DECODE_LEN {
        return Err(FormatError::LengthOutOfBounds {
            field,
            len,
            limit: MAX_DECODE_LEN,
        });
    }
    Ok(cur.take(len as usize, field)?.to_vec())
}

/// Fixed-size raw bytes (no length prefix) — used for hashes and other
/// entities whose size is a structural invariant rather than data.
pub fn encode_fixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
}

pub fn decode_fixed<const N: usize>(
    cur: &mut Cursor<'_>,
    field: &'static str,
) -> Result<[u8; N], FormatError> {
    let slice = cur.take(N, field)?;
    let mut arr = [0u8; N];
    arr.copy_from_slice(slice);
    Ok(arr)
}

// ---------------------------------------------------------------------
// Variable-length sequences of encodable elements: 8-byte little-endian
// count prefix, then elements in order.
// ---------------------------------------------------------------------

pub fn encode_seq<T: Encode>(out: &mut Vec<u8>, items: &[T]) {
    (items.len() as u64).encode(out);
    for item in items {
        item.encode(out);
    }
}

pub fn decode_seq<T: Decode>(
    cur: &mut Cursor<'_>,
    field: &'static str,
) -> Result<Vec<T>, FormatError> {
    let len = u64::decode(cur)?;
    if len > MAX_DECODE_LEN {
        return Err(FormatError::LengthOutOfBounds {
            field,
            len,
            limit: MAX_DECODE_LEN,
        });
    }
    let mut items = Vec::with_capacity(len.min(4096) as usize);
    for _ in 0..len {
        items.push(T::decode(cur)?);
    }
    Ok(items)
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        encode_seq(out, self);
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        decode_seq(cur, "Vec<T>")
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("pos", &self.pos)
            .field("len", &self.buf.len())
            .finish()
    }
}
