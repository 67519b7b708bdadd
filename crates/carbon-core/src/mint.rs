// crates/carbon-core/src/mint.rs

use std::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// A deterministic instruction to mint `amount_base_units` to `recipient`.
///
/// Derived from a `Measurement` by `units::to_mint_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub recipient: Address,
    /// Amount in the token's smallest unit (whole units * 10^decimals).
    #[serde(with = "biguint_decimal")]
    pub amount_base_units: BigUint,
    /// Forwarded verbatim as the `systemId` argument of `mint`.
    pub system_identifier: String,
    /// Rounded whole-unit count the amount was scaled from.
    #[serde(with = "biguint_decimal")]
    pub whole_units: BigUint,
    /// Token precision used for scaling.
    pub decimals: u8,
}

/// Final status reported by a mined transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Confirmed,
    Failed,
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptStatus::Confirmed => write!(f, "confirmed"),
            ReceiptStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Receipt of a mined mint transaction. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    /// 0x-prefixed transaction hash.
    pub transaction_hash: String,
    pub block_number: u64,
    pub status: ReceiptStatus,
}

impl MintReceipt {
    pub fn is_confirmed(&self) -> bool {
        self.status == ReceiptStatus::Confirmed
    }
}

/// A `CarbonCreditMinted` event decoded from the ledger's logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintEvent {
    pub account: Address,
    #[serde(with = "biguint_decimal")]
    pub amount: BigUint,
    pub system_identifier: String,
    pub transaction_hash: String,
    pub block_number: u64,
}

impl MintEvent {
    /// Whether this event records the mint described by `request`.
    pub fn matches(&self, request: &MintRequest) -> bool {
        self.account == request.recipient
            && self.amount == request.amount_base_units
            && self.system_identifier == request.system_identifier
    }

    /// The event was emitted by a successful transaction, so its receipt is confirmed.
    pub fn to_receipt(&self) -> MintReceipt {
        MintReceipt {
            transaction_hash: self.transaction_hash.clone(),
            block_number: self.block_number,
            status: ReceiptStatus::Confirmed,
        }
    }
}

/// Serde adapter storing a `BigUint` as a base-10 string.
pub mod biguint_decimal {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid decimal integer: {}", s)))
    }
}
