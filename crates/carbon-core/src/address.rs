// crates/carbon-core/src/address.rs
//
// 20-byte ledger account address with EIP-55 mixed-case checksum support.
//
// Parsing accepts all-lowercase and all-uppercase hex without a checksum
// check; mixed-case input must carry a valid EIP-55 checksum. Display
// always renders the checksummed form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::keccak256;
use crate::error::CarbonError;

/// A 20-byte ledger account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address. Minting to it always reverts.
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

    /// Left-pad the address into a 32-byte ABI word / log topic.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// Recover an address from the low 20 bytes of a 32-byte word.
    ///
    /// Fails if the upper 12 bytes are not zero.
    pub fn from_word(word: &[u8]) -> Result<Self, CarbonError> {
        if word.len() != 32 || word[..12].iter().any(|b| *b != 0) {
            return Err(CarbonError::InvalidAddress(format!(
                "Not an address word: 0x{}",
                hex::encode(word)
            )));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Ok(Self(bytes))
    }

    /// Render the EIP-55 checksummed form, e.g. `0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed`.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = CarbonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| CarbonError::InvalidAddress(format!("Missing 0x prefix: {}", s)))?;

        if digits.len() != 40 {
            return Err(CarbonError::InvalidAddress(format!(
                "Expected 40 hex characters, got {}: {}",
                digits.len(),
                s
            )));
        }

        let decoded = hex::decode(digits)
            .map_err(|e| CarbonError::InvalidAddress(format!("{}: {}", s, e)))?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&decoded);
        let address = Address(bytes);

        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *digits {
            return Err(CarbonError::InvalidAddress(format!("Bad checksum: {}", s)));
        }

        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}
