// crates/carbon-core/src/traits.rs

use async_trait::async_trait;

use crate::address::Address;
use crate::error::CarbonError;
use crate::measurement::{Measurement, PeriodType};
use crate::mint::{MintEvent, MintReceipt, MintRequest};
use crate::reservation::{Reservation, ReservationKey, ReserveOutcome};

/// Source of simulated capture readings.
///
/// Implemented by carbon-pipeline (HTTP Carbon API client).
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Fetch the reading for one system over the current period.
    async fn fetch_measurement(
        &self,
        system_identifier: &str,
        period: PeriodType,
    ) -> Result<Measurement, CarbonError>;
}

/// Durable at-most-once ledger for mint submissions.
///
/// Implemented by carbon-store (RocksDB and in-memory backends).
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Atomically check for an existing record under `key` and, if none
    /// exists, write a fresh `Reserved` record.
    ///
    /// Two concurrent callers with the same key never both get `Reserved`.
    async fn check_and_reserve(
        &self,
        key: &ReservationKey,
        request: &MintRequest,
        from_block: u64,
    ) -> Result<ReserveOutcome, CarbonError>;

    /// Record the signed transaction hash before it is broadcast.
    async fn mark_submitted(
        &self,
        key: &ReservationKey,
        transaction_hash: &str,
    ) -> Result<(), CarbonError>;

    /// Record the observed receipt. Terminal.
    async fn confirm(&self, key: &ReservationKey, receipt: &MintReceipt) -> Result<(), CarbonError>;

    /// Drop an unconfirmed reservation so the period can be minted again.
    ///
    /// Refuses to drop a confirmed reservation.
    async fn release(&self, key: &ReservationKey) -> Result<(), CarbonError>;

    /// Retrieve a reservation by key.
    async fn get(&self, key: &ReservationKey) -> Result<Option<Reservation>, CarbonError>;

    /// List every reservation, ordered by key.
    async fn list(&self) -> Result<Vec<Reservation>, CarbonError>;

    /// List reservations that have not reached `Confirmed`.
    async fn list_unconfirmed(&self) -> Result<Vec<Reservation>, CarbonError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| !r.is_confirmed())
            .collect())
    }
}

/// A signed, not yet broadcast, mint transaction.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedMint {
    /// 0x-prefixed hash of `raw`; identical to the on-chain transaction hash.
    pub transaction_hash: String,
    /// Signed transaction bytes.
    pub raw: Vec<u8>,
    pub nonce: u64,
    pub gas_limit: u64,
}

impl std::fmt::Debug for SignedMint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedMint")
            .field("transaction_hash", &self.transaction_hash)
            .field("raw_len", &self.raw.len())
            .field("nonce", &self.nonce)
            .field("gas_limit", &self.gas_limit)
            .finish()
    }
}

/// The carbon-credit token contract as seen by the minter.
///
/// Implemented by carbon-ledger (EVM JSON-RPC backend).
#[async_trait]
pub trait MintLedger: Send + Sync {
    /// Account that signs mint transactions (must own the contract).
    fn signer_address(&self) -> Address;

    /// Current chain head.
    async fn block_number(&self) -> Result<u64, CarbonError>;

    /// Token precision from `decimals()`.
    async fn decimals(&self) -> Result<u8, CarbonError>;

    /// Build and sign `mint(recipient, amount, systemId)` without sending it.
    async fn sign_mint(&self, request: &MintRequest) -> Result<SignedMint, CarbonError>;

    /// Broadcast a signed transaction and return its hash.
    ///
    /// `SubmissionRejected` when the node refuses it, `BroadcastUncertain`
    /// when the outcome is unknown.
    async fn broadcast(&self, mint: &SignedMint) -> Result<String, CarbonError>;

    /// Receipt for a mined transaction, `None` while unmined or unknown.
    async fn receipt(&self, transaction_hash: &str) -> Result<Option<MintReceipt>, CarbonError>;

    /// Whether the node still knows the transaction (pending or mined).
    async fn is_known(&self, transaction_hash: &str) -> Result<bool, CarbonError>;

    /// `CarbonCreditMinted` events for `recipient` from `from_block` to the head.
    async fn mint_events(
        &self,
        recipient: &Address,
        from_block: u64,
    ) -> Result<Vec<MintEvent>, CarbonError>;
}
