// crates/carbon-pipeline/src/guard.rs
//
// Duplicate Guard: at-most-once minting per reservation key.
//
// Thin over a `ReservationStore` for the per-run operations, plus the
// recovery pass that resolves reservations left unconfirmed by earlier runs
// using what the ledger can prove.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use carbon_core::mint::{MintReceipt, MintRequest};
use carbon_core::reservation::{Reservation, ReservationKey, ReserveOutcome};
use carbon_core::traits::{MintLedger, ReservationStore};
use carbon_core::CarbonError;

/// What the recovery pass did with each unconfirmed reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub confirmed: Vec<ReservationKey>,
    pub released: Vec<ReservationKey>,
    pub pending: Vec<ReservationKey>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn examined(&self) -> usize {
        self.confirmed.len() + self.released.len() + self.pending.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Confirmed,
    Released,
    Pending,
}

#[derive(Clone)]
pub struct DuplicateGuard {
    store: Arc<dyn ReservationStore>,
}

impl DuplicateGuard {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }

    pub async fn check_and_reserve(
        &self,
        key: &ReservationKey,
        request: &MintRequest,
        from_block: u64,
    ) -> Result<ReserveOutcome, CarbonError> {
        let outcome = self.store.check_and_reserve(key, request, from_block).await?;
        match &outcome {
            ReserveOutcome::Reserved(r) => tracing::info!("Reserved {} (run {})", key, r.run_id),
            ReserveOutcome::AlreadyConfirmed(receipt) => tracing::info!(
                "{} already minted in {}",
                key,
                receipt.transaction_hash
            ),
            ReserveOutcome::InFlight(r) => tracing::warn!(
                "{} is held by run {} in state {}",
                key,
                r.run_id,
                r.state.tag()
            ),
        }
        Ok(outcome)
    }

    pub async fn mark_submitted(&self, key: &ReservationKey, transaction_hash: &str) -> Result<(), CarbonError> {
        self.store.mark_submitted(key, transaction_hash).await
    }

    pub async fn confirm(&self, key: &ReservationKey, receipt: &MintReceipt) -> Result<(), CarbonError> {
        self.store.confirm(key, receipt).await
    }

    pub async fn release(&self, key: &ReservationKey) -> Result<(), CarbonError> {
        self.store.release(key).await?;
        tracing::info!("Released reservation {}", key);
        Ok(())
    }

    pub async fn get(&self, key: &ReservationKey) -> Result<Option<Reservation>, CarbonError> {
        self.store.get(key).await
    }

    pub async fn list(&self) -> Result<Vec<Reservation>, CarbonError> {
        self.store.list().await
    }

    /// Recovery pass over every unconfirmed reservation.
    ///
    /// Per-record ledger failures leave that record pending and do not stop
    /// the pass. Reservations younger than `grace` are never released on
    /// absence of evidence alone.
    pub async fn reconcile(
        &self,
        ledger: &dyn MintLedger,
        grace: Duration,
    ) -> Result<ReconcileReport, CarbonError> {
        let records = self.store.list().await?;

        // Transactions already credited to some confirmed reservation.
        let mut claimed: HashSet<String> = records
            .iter()
            .filter_map(|r| r.receipt().map(|receipt| receipt.transaction_hash.to_ascii_lowercase()))
            .collect();

        let mut report = ReconcileReport::default();
        for record in records.into_iter().filter(|r| !r.is_confirmed()) {
            let key = record.key.clone();
            let resolution = match self.resolve(ledger, &record, grace, &mut claimed).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    tracing::warn!("Could not reconcile {}: {}", key, e);
                    Resolution::Pending
                }
            };
            match resolution {
                Resolution::Confirmed => report.confirmed.push(key),
                Resolution::Released => report.released.push(key),
                Resolution::Pending => report.pending.push(key),
            }
        }

        if report.examined() > 0 {
            tracing::info!(
                "Reconciled {} reservations: {} confirmed, {} released, {} pending",
                report.examined(),
                report.confirmed.len(),
                report.released.len(),
                report.pending.len()
            );
        }
        Ok(report)
    }

    async fn resolve(
        &self,
        ledger: &dyn MintLedger,
        record: &Reservation,
        grace: Duration,
        claimed: &mut HashSet<String>,
    ) -> Result<Resolution, CarbonError> {
        // Hashes are recorded before broadcast, so a record without one never
        // reached the ledger and no event can belong to it.
        let Some(hash) = record.transaction_hash() else {
            return self.release_if_stale(record, grace).await;
        };

        match ledger.receipt(hash).await? {
            Some(receipt) if receipt.is_confirmed() => {
                self.store.confirm(&record.key, &receipt).await?;
                claimed.insert(receipt.transaction_hash.to_ascii_lowercase());
                tracing::info!("{} confirmed by receipt of {}", record.key, hash);
                return Ok(Resolution::Confirmed);
            }
            Some(receipt) => {
                tracing::warn!(
                    "{} reverted in block {}; releasing {}",
                    hash,
                    receipt.block_number,
                    record.key
                );
                self.store.release(&record.key).await?;
                return Ok(Resolution::Released);
            }
            None => {
                if ledger.is_known(hash).await? {
                    tracing::info!("{} still pending at the node", hash);
                    return Ok(Resolution::Pending);
                }
            }
        }

        let events = ledger
            .mint_events(&record.request.recipient, record.from_block)
            .await?;
        let found = events.iter().find(|event| {
            event.matches(&record.request)
                && !claimed.contains(&event.transaction_hash.to_ascii_lowercase())
        });
        if let Some(event) = found {
            let receipt = event.to_receipt();
            self.store.confirm(&record.key, &receipt).await?;
            claimed.insert(receipt.transaction_hash.to_ascii_lowercase());
            tracing::info!(
                "{} confirmed by CarbonCreditMinted in {}",
                record.key,
                receipt.transaction_hash
            );
            return Ok(Resolution::Confirmed);
        }

        self.release_if_stale(record, grace).await
    }

    /// Release `record` once it has gone `grace` without progress.
    async fn release_if_stale(
        &self,
        record: &Reservation,
        grace: Duration,
    ) -> Result<Resolution, CarbonError> {
        let age = (Utc::now() - record.updated_at).to_std().unwrap_or(Duration::ZERO);
        if age < grace {
            return Ok(Resolution::Pending);
        }
        tracing::warn!(
            "No trace of {} on the ledger after {:?}; releasing",
            record.key,
            age
        );
        self.store.release(&record.key).await?;
        Ok(Resolution::Released)
    }
}
