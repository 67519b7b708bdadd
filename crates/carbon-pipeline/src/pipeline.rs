// crates/carbon-pipeline/src/pipeline.rs
//
// One end-to-end mint: fetch -> convert -> reserve -> sign -> record hash
// -> broadcast -> confirm.
//
// The pipeline returns an outcome value; deciding what that means for the
// process (exit code, output) is left to the caller.

use std::sync::Arc;
use std::time::Duration;

use carbon_core::measurement::{Measurement, PeriodType};
use carbon_core::mint::{MintReceipt, MintRequest};
use carbon_core::reservation::{Reservation, ReservationKey, ReserveOutcome};
use carbon_core::traits::MeasurementSource;
use carbon_core::units::to_mint_request;
use carbon_core::{Address, CarbonError};

use crate::guard::{DuplicateGuard, ReconcileReport};
use crate::submitter::MintSubmitter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub recipient: Address,
    /// Token precision; read from the contract when `None`.
    pub decimals: Option<u8>,
    /// Minimum age before an untraceable reservation is released.
    pub reconcile_grace: Duration,
    /// Run the recovery pass before every mint.
    pub reconcile_first: bool,
}

/// Result of a pipeline run that did not fail.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// The reading rounds to zero or less.
    NothingToMint { measurement: Measurement },
    Minted {
        key: ReservationKey,
        request: MintRequest,
        receipt: MintReceipt,
    },
    /// The window was minted by an earlier run.
    AlreadyMinted {
        key: ReservationKey,
        receipt: MintReceipt,
    },
    /// Another run holds the window, or an earlier run's outcome is still unknown.
    InFlight {
        key: ReservationKey,
        reservation: Reservation,
    },
}

pub struct MintPipeline {
    source: Arc<dyn MeasurementSource>,
    guard: DuplicateGuard,
    submitter: MintSubmitter,
    config: PipelineConfig,
}

impl MintPipeline {
    pub fn new(
        source: Arc<dyn MeasurementSource>,
        guard: DuplicateGuard,
        submitter: MintSubmitter,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            guard,
            submitter,
            config,
        }
    }

    pub fn guard(&self) -> &DuplicateGuard {
        &self.guard
    }

    /// Recovery pass only.
    pub async fn reconcile(&self) -> Result<ReconcileReport, CarbonError> {
        self.guard
            .reconcile(self.submitter.ledger().as_ref(), self.config.reconcile_grace)
            .await
    }

    /// Fetch and convert without reserving or submitting anything.
    pub async fn preview(
        &self,
        system_identifier: &str,
        period: PeriodType,
    ) -> Result<(Measurement, Option<MintRequest>), CarbonError> {
        let measurement = self.source.fetch_measurement(system_identifier, period).await?;
        let decimals = self.decimals().await?;
        match to_mint_request(&measurement, self.config.recipient, decimals) {
            Ok(request) => Ok((measurement, Some(request))),
            Err(CarbonError::NonPositiveQuantity { .. }) => Ok((measurement, None)),
            Err(e) => Err(e),
        }
    }

    async fn decimals(&self) -> Result<u8, CarbonError> {
        match self.config.decimals {
            Some(decimals) => Ok(decimals),
            None => self.submitter.ledger().decimals().await,
        }
    }

    /// Mint the current `period` reading for `system_identifier`, at most once per window.
    pub async fn run(
        &self,
        system_identifier: &str,
        period: PeriodType,
    ) -> Result<PipelineOutcome, CarbonError> {
        if self.config.reconcile_first {
            let report = self.reconcile().await?;
            if !report.is_clean() {
                tracing::warn!("{} reservations remain unresolved", report.pending.len());
            }
        }

        let measurement = self.source.fetch_measurement(system_identifier, period).await?;
        let decimals = self.decimals().await?;
        let request = match to_mint_request(&measurement, self.config.recipient, decimals) {
            Ok(request) => request,
            Err(CarbonError::NonPositiveQuantity { units }) => {
                tracing::info!(
                    "{} units for {} rounds to nothing; not minting",
                    units,
                    system_identifier
                );
                return Ok(PipelineOutcome::NothingToMint { measurement });
            }
            Err(e) => return Err(e),
        };

        let key = ReservationKey::new(system_identifier, &measurement.window());
        let from_block = self.submitter.ledger().block_number().await?;

        match self.guard.check_and_reserve(&key, &request, from_block).await? {
            ReserveOutcome::Reserved(_) => {}
            ReserveOutcome::AlreadyConfirmed(receipt) => {
                return Ok(PipelineOutcome::AlreadyMinted { key, receipt })
            }
            ReserveOutcome::InFlight(reservation) => {
                return Ok(PipelineOutcome::InFlight { key, reservation })
            }
        }

        tracing::info!(
            "Minting {} units ({} base units) for {} to {}",
            request.whole_units,
            request.amount_base_units,
            key,
            request.recipient
        );

        let receipt = self.submit_reserved(&key, &request).await?;
        Ok(PipelineOutcome::Minted {
            key,
            request,
            receipt,
        })
    }

    /// Drive a reserved request to a receipt, releasing the reservation
    /// whenever the ledger cannot have minted it.
    async fn submit_reserved(
        &self,
        key: &ReservationKey,
        request: &MintRequest,
    ) -> Result<MintReceipt, CarbonError> {
        // Nothing has left the process before broadcast, so any failure releases.
        let signed = match self.submitter.sign(request).await {
            Ok(signed) => signed,
            Err(e) => return Err(self.release_after(key, e).await),
        };
        if let Err(e) = self.guard.mark_submitted(key, &signed.transaction_hash).await {
            return Err(self.release_after(key, e).await);
        }

        let outcome = match self.submitter.broadcast(&signed).await {
            Ok(hash) => self.submitter.await_confirmation(&hash).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(receipt) => {
                self.guard.confirm(key, &receipt).await?;
                Ok(receipt)
            }
            Err(e) if e.releases_reservation() => Err(self.release_after(key, e).await),
            Err(e) => {
                if e.is_ambiguous() {
                    tracing::warn!(
                        "Outcome of {} unknown ({}); reservation {} kept for reconciliation",
                        signed.transaction_hash,
                        e,
                        key
                    );
                }
                Err(e)
            }
        }
    }

    /// Release `key` and hand back the error that caused it.
    async fn release_after(&self, key: &ReservationKey, cause: CarbonError) -> CarbonError {
        if let Err(e) = self.guard.release(key).await {
            tracing::error!("Failed to release {} after {}: {}", key, cause, e);
        }
        cause
    }
}
