// crates/carbon-core/src/reservation.rs
//
// Duplicate-guard records.
//
// A reservation claims the right to mint for one (system, period window)
// pair. Lifecycle:
//
//   Reserved --> Submitted { tx_hash } --> Confirmed { receipt }
//       |                |
//       +----------------+--> released (record deleted) when the ledger
//                              proves nothing was minted

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::measurement::PeriodWindow;
use crate::mint::{MintReceipt, MintRequest};

/// Idempotency key: `{system_identifier}:{period type}:{window end, RFC3339}`.
///
/// The period type is part of the key because windows of different lengths
/// can end at the same instant (a Sunday and its week, the 31st and its month).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservationKey(String);

impl ReservationKey {
    pub fn new(system_identifier: &str, window: &PeriodWindow) -> Self {
        Self(format!(
            "{}:{}:{}",
            system_identifier,
            window.period_type,
            window.end.format("%Y-%m-%dT%H:%M:%SZ")
        ))
    }

    /// Rebuild a key from its stored string form.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a reserved mint currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReservationState {
    /// Claimed; no transaction signed yet.
    Reserved,
    /// Signed transaction hash recorded; broadcast may or may not have happened.
    Submitted { transaction_hash: String },
    /// Receipt observed on-chain.
    Confirmed { receipt: MintReceipt },
}

impl ReservationState {
    pub fn tag(&self) -> &'static str {
        match self {
            ReservationState::Reserved => "reserved",
            ReservationState::Submitted { .. } => "submitted",
            ReservationState::Confirmed { .. } => "confirmed",
        }
    }
}

/// Durable duplicate-guard record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub key: ReservationKey,
    pub request: MintRequest,
    pub state: ReservationState,
    /// Run that took the reservation (UUID v7, time-ordered).
    pub run_id: Uuid,
    /// Chain head when the reservation was taken; event searches start here.
    pub from_block: u64,
    pub reserved_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(key: ReservationKey, request: MintRequest, from_block: u64) -> Self {
        let now = Utc::now();
        Self {
            key,
            request,
            state: ReservationState::Reserved,
            run_id: Uuid::now_v7(),
            from_block,
            reserved_at: now,
            updated_at: now,
        }
    }

    pub fn receipt(&self) -> Option<&MintReceipt> {
        match &self.state {
            ReservationState::Confirmed { receipt } => Some(receipt),
            _ => None,
        }
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        match &self.state {
            ReservationState::Submitted { transaction_hash } => Some(transaction_hash),
            ReservationState::Confirmed { receipt } => Some(&receipt.transaction_hash),
            ReservationState::Reserved => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.state, ReservationState::Confirmed { .. })
    }
}

/// Result of an atomic check-and-reserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// The caller now owns the reservation and may submit.
    Reserved(Reservation),
    /// The period was already minted; the existing receipt is returned.
    AlreadyConfirmed(MintReceipt),
    /// Another run holds an unconfirmed reservation for the key.
    InFlight(Reservation),
}

impl ReserveOutcome {
    /// Whether the caller may proceed to submit.
    pub fn allowed(&self) -> bool {
        matches!(self, ReserveOutcome::Reserved(_))
    }

    pub fn existing_receipt(&self) -> Option<&MintReceipt> {
        match self {
            ReserveOutcome::AlreadyConfirmed(receipt) => Some(receipt),
            _ => None,
        }
    }
}
