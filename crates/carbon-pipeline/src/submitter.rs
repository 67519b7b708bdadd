// crates/carbon-pipeline/src/submitter.rs
//
// Mint Submitter: sign, broadcast, and wait for the receipt of one mint.
//
// The three steps are exposed separately so the pipeline can record the
// transaction hash with the duplicate guard between signing and broadcast.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use carbon_core::mint::{MintReceipt, MintRequest};
use carbon_core::traits::{MintLedger, SignedMint};
use carbon_core::CarbonError;

/// How long and how often to poll for a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitterConfig {
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    /// Blocks (including the receipt's own) required before a mint counts as confirmed.
    pub confirmations: u64,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            confirmations: 1,
        }
    }
}

pub struct MintSubmitter {
    ledger: Arc<dyn MintLedger>,
    config: SubmitterConfig,
}

impl MintSubmitter {
    pub fn new(ledger: Arc<dyn MintLedger>, config: SubmitterConfig) -> Self {
        Self { ledger, config }
    }

    pub fn ledger(&self) -> &Arc<dyn MintLedger> {
        &self.ledger
    }

    /// Build and sign the mint transaction without sending it.
    pub async fn sign(&self, request: &MintRequest) -> Result<SignedMint, CarbonError> {
        if request.recipient.is_zero() {
            return Err(CarbonError::InvalidAddress(
                "recipient is the zero address".to_string(),
            ));
        }
        self.ledger.sign_mint(request).await
    }

    pub async fn broadcast(&self, signed: &SignedMint) -> Result<String, CarbonError> {
        let hash = self.ledger.broadcast(signed).await?;
        tracing::info!("Broadcast mint transaction {} (nonce {})", hash, signed.nonce);
        Ok(hash)
    }

    /// Poll until the receipt has the configured confirmations.
    ///
    /// `ExecutionReverted` for a failed receipt, `ConfirmationTimeout` when
    /// the deadline passes first. Read errors while polling are logged and
    /// polling continues.
    pub async fn await_confirmation(&self, transaction_hash: &str) -> Result<MintReceipt, CarbonError> {
        let started = Instant::now();
        let deadline = started + self.config.confirmation_timeout;
        let required = self.config.confirmations.max(1);

        loop {
            match self.ledger.receipt(transaction_hash).await {
                Ok(Some(receipt)) if !receipt.is_confirmed() => {
                    return Err(CarbonError::ExecutionReverted {
                        tx_hash: transaction_hash.to_string(),
                        block_number: receipt.block_number,
                    });
                }
                Ok(Some(receipt)) => match self.confirmations_of(&receipt).await {
                    Ok(seen) if seen >= required => {
                        tracing::info!(
                            "Mint {} confirmed in block {} ({} confirmations)",
                            transaction_hash,
                            receipt.block_number,
                            seen
                        );
                        return Ok(receipt);
                    }
                    Ok(seen) => tracing::debug!(
                        "Mint {} has {}/{} confirmations",
                        transaction_hash,
                        seen,
                        required
                    ),
                    Err(e) => tracing::warn!("Reading chain head failed: {}", e),
                },
                Ok(None) => tracing::debug!("No receipt yet for {}", transaction_hash),
                Err(e) => tracing::warn!("Receipt poll for {} failed: {}", transaction_hash, e),
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    "Gave up waiting for {} after {:?}",
                    transaction_hash,
                    self.config.confirmation_timeout
                );
                return Err(CarbonError::ConfirmationTimeout {
                    tx_hash: transaction_hash.to_string(),
                    waited_secs: (now - started).as_secs(),
                });
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    async fn confirmations_of(&self, receipt: &MintReceipt) -> Result<u64, CarbonError> {
        if self.config.confirmations <= 1 {
            return Ok(1);
        }
        let head = self.ledger.block_number().await?;
        Ok((head + 1).saturating_sub(receipt.block_number))
    }

    /// Sign, broadcast, and wait, with no duplicate guard involved.
    pub async fn submit(&self, request: &MintRequest) -> Result<MintReceipt, CarbonError> {
        let signed = self.sign(request).await?;
        let hash = self.broadcast(&signed).await?;
        self.await_confirmation(&hash).await
    }
}
