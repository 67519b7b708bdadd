// crates/carbon-store/src/lifecycle.rs
//
// State transition rules shared by every ReservationStore backend.
//
//   check:   (none) -> Reserved            | Confirmed -> AlreadyConfirmed
//                                          | otherwise -> InFlight
//   submit:  Reserved -> Submitted         | same hash again is a no-op
//   confirm: Reserved/Submitted -> Confirmed | same receipt again is a no-op
//   release: Reserved/Submitted -> (none)  | Confirmed is refused

use chrono::Utc;

use carbon_core::error::CarbonError;
use carbon_core::mint::{MintReceipt, MintRequest};
use carbon_core::reservation::{Reservation, ReservationKey, ReservationState, ReserveOutcome};

/// Decide the outcome of a check-and-reserve given the current record.
///
/// Returns the outcome and, when the caller won, the record to persist.
pub(crate) fn check(
    existing: Option<Reservation>,
    key: &ReservationKey,
    request: &MintRequest,
    from_block: u64,
) -> (ReserveOutcome, Option<Reservation>) {
    match existing {
        None => {
            let fresh = Reservation::new(key.clone(), request.clone(), from_block);
            (ReserveOutcome::Reserved(fresh.clone()), Some(fresh))
        }
        Some(record) => match &record.state {
            ReservationState::Confirmed { receipt } => {
                (ReserveOutcome::AlreadyConfirmed(receipt.clone()), None)
            }
            _ => (ReserveOutcome::InFlight(record), None),
        },
    }
}

pub(crate) fn submitted(
    existing: Option<Reservation>,
    key: &ReservationKey,
    transaction_hash: &str,
) -> Result<Option<Reservation>, CarbonError> {
    let mut record = existing.ok_or_else(|| missing(key))?;
    match &record.state {
        ReservationState::Reserved => {
            record.state = ReservationState::Submitted {
                transaction_hash: transaction_hash.to_string(),
            };
            record.updated_at = Utc::now();
            Ok(Some(record))
        }
        ReservationState::Submitted { transaction_hash: current } if current == transaction_hash => {
            Ok(None)
        }
        other => Err(CarbonError::Storage(format!(
            "Cannot mark {} submitted as {}: reservation is {}",
            key,
            transaction_hash,
            other.tag()
        ))),
    }
}

pub(crate) fn confirmed(
    existing: Option<Reservation>,
    key: &ReservationKey,
    receipt: &MintReceipt,
) -> Result<Option<Reservation>, CarbonError> {
    let mut record = existing.ok_or_else(|| missing(key))?;
    match &record.state {
        ReservationState::Confirmed { receipt: current } if current == receipt => Ok(None),
        ReservationState::Confirmed { receipt: current } => Err(CarbonError::Storage(format!(
            "Reservation {} already confirmed by {}",
            key, current.transaction_hash
        ))),
        _ => {
            record.state = ReservationState::Confirmed {
                receipt: receipt.clone(),
            };
            record.updated_at = Utc::now();
            Ok(Some(record))
        }
    }
}

/// Returns `true` if the record must be deleted, `false` if there was none.
pub(crate) fn released(
    existing: Option<&Reservation>,
    key: &ReservationKey,
) -> Result<bool, CarbonError> {
    match existing {
        None => Ok(false),
        Some(record) if record.is_confirmed() => Err(CarbonError::Storage(format!(
            "Refusing to release confirmed reservation {}",
            key
        ))),
        Some(_) => Ok(true),
    }
}

fn missing(key: &ReservationKey) -> CarbonError {
    CarbonError::Storage(format!("No reservation for {}", key))
}
