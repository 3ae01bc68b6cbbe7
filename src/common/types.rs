//! Shared type definitions for the Salad pool
//!
//! Canonical identifiers, amounts and the 256-bit randomness word used
//! throughout the crate.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Smallest unit of the stake token.
pub type Amount = u128;

/// Dense, 0-based round identifier.
pub type RoundId = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Participant or principal identifier (wallet address, oracle key, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Stakeable asset, identified by symbol and optional contract address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Token {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
}

impl Token {
    pub fn new(symbol: impl Into<String>, contract: Option<String>) -> Self {
        Self {
            symbol: symbol.into(),
            contract,
        }
    }

    /// Native chain coin
    pub fn native() -> Self {
        Self::new("NATIVE", None)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.contract {
            Some(contract) => write!(f, "{}@{}", self.symbol, contract),
            None => f.write_str(&self.symbol),
        }
    }
}

/// Unsigned 256-bit random value, big-endian.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RandomWord([u8; 32]);

impl RandomWord {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub fn from_hex(value: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(value.trim_start_matches("0x"), &mut bytes)?;
        Ok(Self(bytes))
    }

    /// SHA-256 of arbitrary input, used to derive words from VRF signatures
    pub fn digest(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Exact `value mod modulus` over the full 256 bits.
    pub fn reduce(&self, modulus: u64) -> u64 {
        debug_assert!(modulus > 0);
        let modulus = modulus as u128;
        let rem = self
            .0
            .iter()
            .fold(0u128, |acc, byte| (acc * 256 + *byte as u128) % modulus);
        rem as u64
    }
}

impl fmt::Debug for RandomWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandomWord(0x{})", self.to_hex())
    }
}

impl fmt::Display for RandomWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl Serialize for RandomWord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RandomWord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RandomWord::from_hex(&raw).map_err(de::Error::custom)
    }
}
