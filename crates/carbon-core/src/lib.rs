// crates/carbon-core/src/lib.rs
//
// carbon-core: Core types, traits, unit conversion, and crypto primitives
// for the carbon credit minter.
//
// This is the leaf crate every other crate in the workspace depends on.
// It defines the measurement and mint data model, the duplicate-guard
// records, the workspace error type, and the trait seams (measurement
// source, reservation store, mint ledger) the pipeline is assembled from.

pub mod address;
pub mod crypto;
pub mod error;
pub mod measurement;
pub mod mint;
pub mod reservation;
pub mod traits;
pub mod units;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use carbon_core::MintRequest;`

pub use address::Address;
pub use error::CarbonError;
pub use measurement::{Measurement, PeriodType, PeriodWindow};
pub use mint::{MintEvent, MintReceipt, MintRequest, ReceiptStatus};
pub use reservation::{Reservation, ReservationKey, ReservationState, ReserveOutcome};
pub use traits::{MeasurementSource, MintLedger, ReservationStore, SignedMint};
pub use units::{format_units, to_mint_request, DEFAULT_DECIMALS};
