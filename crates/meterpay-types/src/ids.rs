//! Account and session identifiers used throughout MeterPay.
//!
//! Accounts are 20-byte addresses (the Keccak-derived secp256k1 account
//! format), so a key recovered from a signature compares directly against
//! a configured role.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{MeterpayError, Result};

/// Value unit. All balances, charges, and fees are whole wei.
pub type Wei = u128;

/// Seconds since the UNIX epoch.
pub type Timestamp = u64;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account address.
///
/// Serialized as a `0x`-prefixed lowercase hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address. Never a valid role holder.
    pub const ZERO: Self = Self([0u8; 20]);

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = MeterpayError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| MeterpayError::Serialization(format!("invalid address {s}: {e}")))?;
        let bytes: [u8; 20] = bytes.try_into().map_err(|v: Vec<u8>| {
            MeterpayError::Serialization(format!(
                "invalid address {s}: expected 20 bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Identifier of a metered session, chosen off-chain by the platform.
///
/// Encoded in the signed digest as a 32-byte big-endian `int256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SessionId(pub u128);

impl SessionId {
    /// 32-byte big-endian two's-complement encoding (always non-negative).
    #[must_use]
    pub fn to_word(self) -> [u8; 32] {
        u128_word(self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Left-pad a `u128` to a 32-byte big-endian word.
#[must_use]
pub fn u128_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
