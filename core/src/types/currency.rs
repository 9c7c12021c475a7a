//! Arbitrary-precision unsigned currency amounts.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::encoding::{Cursor, Decode, Encode, FormatError, MAX_DECODE_LEN};

/// Number of decimal places a whole "coin" is divided into. Matches the
/// convention used by other UTXO-model PoS chains in this corpus
/// (24-decimal base units); see `DESIGN.md` for the rationale — nothing
/// in `spec.md` fixes this constant, so it is a deliberate, documented
/// choice rather than an invented one.
pub const CURRENCY_DECIMALS: u32 = 24;

/// An arbitrary-precision unsigned amount of coins or block-stake units.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(#[serde(with = "biguint_decimal")] BigUint);

impl Currency {
    pub fn zero() -> Self {
        Currency(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn from_u64(value: u64) -> Self {
        Currency(BigUint::from(value))
    }

    /// One whole coin, expressed in base units (`10^CURRENCY_DECIMALS`).
    pub fn one_coin() -> Self {
        Currency(BigUint::from(10u32).pow(CURRENCY_DECIMALS))
    }

    pub fn checked_add(&self, other: &Currency) -> Currency {
        Currency(&self.0 + &other.0)
    }

    /// Returns `None` on underflow (the ledger must never observe this;
    /// callers use it to turn an invariant violation into a typed error
    /// instead of panicking).
    pub fn checked_sub(&self, other: &Currency) -> Option<Currency> {
        if self.0 < other.0 {
            None
        } else {
            Some(Currency(&self.0 - &other.0))
        }
    }

    pub fn checked_mul_u64(&self, factor: u64) -> Currency {
        Currency(&self.0 * BigUint::from(factor))
    }

    pub fn to_biguint(&self) -> BigUint {
        self.0.clone()
    }
}

impl Add for Currency {
    type Output = Currency;
    fn add(self, rhs: Currency) -> Currency {
        Currency(self.0 + rhs.0)
    }
}

impl Sub for Currency {
    type Output = Currency;
    fn sub(self, rhs: Currency) -> Currency {
        Currency(self.0 - rhs.0)
    }
}

impl Sum for Currency {
    fn sum<I: Iterator<Item = Currency>>(iter: I) -> Self {
        iter.fold(Currency::zero(), |acc, x| acc.checked_add(&x))
    }
}

impl<'a> Sum<&'a Currency> for Currency {
    fn sum<I: Iterator<Item = &'a Currency>>(iter: I) -> Self {
        iter.fold(Currency::zero(), |acc, x| acc.checked_add(x))
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.0)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Currency {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Currency(BigUint::from_str(s)?))
    }
}

/// Big-endian minimal-byte representation with an 8-byte length prefix.
/// Zero encodes as a zero-length payload.
impl Encode for Currency {
    fn encode(&self, out: &mut Vec<u8>) {
        let bytes = if self.0.is_zero() {
            Vec::new()
        } else {
            self.0.to_bytes_be()
        };
        (bytes.len() as u64).encode(out);
        out.extend_from_slice(&bytes);
    }
}

impl Decode for Currency {
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, FormatError> {
        let len = u64::decode(cur)?;
        if len > MAX_DECODE_LEN {
            return Err(FormatError::LengthOutOfBounds {
                field: "Currency",
                len,
                limit: MAX_DECODE_LEN,
            });
        }
        let bytes = cur.take(len as usize, "Currency")?;
        Ok(Currency(BigUint::from_bytes_be(bytes)))
    }
}

mod biguint_decimal {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        value.to_string().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(d)?;
        BigUint::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_encodes_as_empty_payload() {
        let mut out = Vec::new();
        Currency::zero().encode(&mut out);
        assert_eq!(out, 0u64.to_le_bytes().to_vec());
    }

    #[test]
    fn roundtrips_through_canonical_bytes() {
        let c = Currency::from_u64(1_000) + Currency::one_coin();
        let bytes = c.encode_to_vec();
        let mut cur = Cursor::new(&bytes);
        let decoded = Currency::decode(&mut cur).unwrap();
        assert_eq!(c, decoded);
    }

    #[test]
    fn checked_sub_detects_underflow() {
        let a = Currency::from_u64(5);
        let b = Currency::from_u64(10);
        assert!(a.checked_sub(&b).is_none());
    }

    #[test]
    fn json_roundtrips_as_decimal_string() {
        let c = Currency::one_coin();
        let json = serde_json::to_string(&c).unwrap();
        let back: Currency = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
