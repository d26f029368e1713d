use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tiny_keccak::{Hasher, Keccak};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),

    #[error("address must be 20 bytes, got {0} hex chars")]
    InvalidLength(usize),

    #[error("address is not valid hex: {0}")]
    InvalidHex(String),
}

/// A 20-byte EVM account or contract address.
///
/// Comparison is on the raw bytes, so differently-cased hex strings of the
/// same address compare equal once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// EIP-55 mixed-case checksum encoding.
    pub fn to_checksum(&self) -> String {
        let hex_addr = hex::encode(self.0);
        let mut hasher = Keccak::v256();
        hasher.update(hex_addr.as_bytes());
        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);

        let mut result = String::with_capacity(42);
        result.push_str("0x");
        for (i, c) in hex_addr.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                (hash[i / 2] >> 4) & 0x0f
            } else {
                hash[i / 2] & 0x0f
            };
            if nibble >= 8 {
                result.push(c.to_ascii_uppercase());
            } else {
                result.push(c);
            }
        }
        result
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(s.to_string()))?;
        if body.len() != 40 {
            return Err(AddressError::InvalidLength(body.len()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(body, &mut bytes)
            .map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        Ok(Self(bytes))
    }
}

/// Lowercase `0x`-prefixed hex, the form JSON-RPC requests use.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
