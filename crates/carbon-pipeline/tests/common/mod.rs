// crates/carbon-pipeline/tests/common/mod.rs
//
// Scripted measurement source and ledger shared by the pipeline tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use carbon_core::measurement::{Measurement, PeriodType};
use carbon_core::mint::{MintEvent, MintReceipt, MintRequest, ReceiptStatus};
use carbon_core::traits::{MeasurementSource, MintLedger, ReservationStore, SignedMint};
use carbon_core::{Address, CarbonError};
use carbon_pipeline::{
    DuplicateGuard, MintPipeline, MintSubmitter, PipelineConfig, SubmitterConfig,
};

pub const SYSTEM: &str = "AC:XX0001";

pub fn recipient() -> Address {
    "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap()
}

pub fn owner() -> Address {
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
}

pub fn observed_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

pub struct FakeSource {
    pub units: Mutex<f64>,
    pub observed_at: Mutex<DateTime<Utc>>,
    pub calls: AtomicU32,
}

impl FakeSource {
    pub fn new(units: f64) -> Self {
        Self {
            units: Mutex::new(units),
            observed_at: Mutex::new(observed_at()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn observed(self, at: DateTime<Utc>) -> Self {
        *self.observed_at.lock().unwrap() = at;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeasurementSource for FakeSource {
    async fn fetch_measurement(
        &self,
        system_identifier: &str,
        period: PeriodType,
    ) -> Result<Measurement, CarbonError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Measurement {
            system_identifier: system_identifier.to_string(),
            period_type: period,
            simulated_units: *self.units.lock().unwrap(),
            observed_at_end_time: *self.observed_at.lock().unwrap(),
            system_name: Some("System Alpha".to_string()),
            calculation_start_time: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// What happens to a transaction once broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    Success,
    Revert,
    /// Accepted into the pool, never mined.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastMode {
    Accept,
    /// The node refuses the transaction.
    Reject,
    /// The connection drops but the transaction was mined.
    LostButLanded,
    /// The connection drops and the transaction never arrived.
    Lost,
}

#[derive(Debug)]
pub struct LedgerState {
    pub head: u64,
    pub nonce: u64,
    pub decimals: u8,
    pub receipt_mode: ReceiptMode,
    pub broadcast_mode: BroadcastMode,
    /// Advance the head by one on every `block_number` call.
    pub advance_on_read: bool,
    pub pending: HashMap<String, MintRequest>,
    pub signed: Vec<String>,
    pub broadcasts: Vec<String>,
    pub receipts: HashMap<String, MintReceipt>,
    pub known: HashSet<String>,
    pub events: Vec<MintEvent>,
}

pub struct FakeLedger {
    pub state: Mutex<LedgerState>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                head: 100,
                nonce: 0,
                decimals: 18,
                receipt_mode: ReceiptMode::Success,
                broadcast_mode: BroadcastMode::Accept,
                advance_on_read: false,
                pending: HashMap::new(),
                signed: Vec::new(),
                broadcasts: Vec::new(),
                receipts: HashMap::new(),
                known: HashSet::new(),
                events: Vec::new(),
            }),
        }
    }

    pub fn with_receipt_mode(self, mode: ReceiptMode) -> Self {
        self.state.lock().unwrap().receipt_mode = mode;
        self
    }

    pub fn with_broadcast_mode(self, mode: BroadcastMode) -> Self {
        self.state.lock().unwrap().broadcast_mode = mode;
        self
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        self.state.lock().unwrap().receipt_mode = mode;
    }

    pub fn set_broadcast_mode(&self, mode: BroadcastMode) {
        self.state.lock().unwrap().broadcast_mode = mode;
    }

    /// Number of successful mints recorded on the ledger.
    pub fn mint_count(&self) -> usize {
        self.state.lock().unwrap().events.len()
    }

    pub fn signed_count(&self) -> usize {
        self.state.lock().unwrap().signed.len()
    }

    pub fn push_event(&self, request: &MintRequest, transaction_hash: &str) {
        let mut state = self.state.lock().unwrap();
        state.head += 1;
        let block_number = state.head;
        state.events.push(MintEvent {
            account: request.recipient,
            amount: request.amount_base_units.clone(),
            system_identifier: request.system_identifier.clone(),
            transaction_hash: transaction_hash.to_string(),
            block_number,
        });
    }

    fn mine(state: &mut LedgerState, hash: &str, status: ReceiptStatus) {
        state.head += 1;
        let block_number = state.head;
        state.receipts.insert(
            hash.to_string(),
            MintReceipt {
                transaction_hash: hash.to_string(),
                block_number,
                status,
            },
        );
        if status == ReceiptStatus::Confirmed {
            if let Some(request) = state.pending.get(hash).cloned() {
                state.events.push(MintEvent {
                    account: request.recipient,
                    amount: request.amount_base_units,
                    system_identifier: request.system_identifier,
                    transaction_hash: hash.to_string(),
                    block_number,
                });
            }
        }
    }
}

#[async_trait]
impl MintLedger for FakeLedger {
    fn signer_address(&self) -> Address {
        owner()
    }

    async fn block_number(&self) -> Result<u64, CarbonError> {
        let mut state = self.state.lock().unwrap();
        if state.advance_on_read {
            state.head += 1;
        }
        Ok(state.head)
    }

    async fn decimals(&self) -> Result<u8, CarbonError> {
        Ok(self.state.lock().unwrap().decimals)
    }

    async fn sign_mint(&self, request: &MintRequest) -> Result<SignedMint, CarbonError> {
        let mut state = self.state.lock().unwrap();
        let nonce = state.nonce;
        state.nonce += 1;
        let transaction_hash = format!("0x{:064x}", nonce + 1);
        state.pending.insert(transaction_hash.clone(), request.clone());
        state.signed.push(transaction_hash.clone());
        Ok(SignedMint {
            transaction_hash,
            raw: nonce.to_be_bytes().to_vec(),
            nonce,
            gas_limit: 130_000,
        })
    }

    async fn broadcast(&self, mint: &SignedMint) -> Result<String, CarbonError> {
        let mut state = self.state.lock().unwrap();
        let hash = mint.transaction_hash.clone();
        let uncertain = || CarbonError::BroadcastUncertain {
            tx_hash: hash.clone(),
            reason: "connection reset".to_string(),
        };
        match state.broadcast_mode {
            BroadcastMode::Reject => {
                return Err(CarbonError::SubmissionRejected("nonce too low".to_string()))
            }
            BroadcastMode::Lost => return Err(uncertain()),
            BroadcastMode::Accept | BroadcastMode::LostButLanded => {}
        }

        state.broadcasts.push(hash.clone());
        state.known.insert(hash.clone());
        match state.receipt_mode {
            ReceiptMode::Success => Self::mine(&mut state, &hash, ReceiptStatus::Confirmed),
            ReceiptMode::Revert => Self::mine(&mut state, &hash, ReceiptStatus::Failed),
            ReceiptMode::Never => {}
        }

        if state.broadcast_mode == BroadcastMode::LostButLanded {
            return Err(uncertain());
        }
        Ok(hash)
    }

    async fn receipt(&self, transaction_hash: &str) -> Result<Option<MintReceipt>, CarbonError> {
        Ok(self.state.lock().unwrap().receipts.get(transaction_hash).cloned())
    }

    async fn is_known(&self, transaction_hash: &str) -> Result<bool, CarbonError> {
        Ok(self.state.lock().unwrap().known.contains(transaction_hash))
    }

    async fn mint_events(
        &self,
        recipient: &Address,
        from_block: u64,
    ) -> Result<Vec<MintEvent>, CarbonError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.account == *recipient && e.block_number >= from_block)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

pub fn fast_submitter_config() -> SubmitterConfig {
    SubmitterConfig {
        confirmation_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(5),
        confirmations: 1,
    }
}

pub fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        recipient: recipient(),
        decimals: None,
        reconcile_grace: Duration::from_secs(600),
        reconcile_first: true,
    }
}

pub fn pipeline(
    source: Arc<dyn MeasurementSource>,
    store: Arc<dyn ReservationStore>,
    ledger: Arc<FakeLedger>,
    config: PipelineConfig,
) -> MintPipeline {
    let submitter = MintSubmitter::new(ledger, fast_submitter_config());
    MintPipeline::new(source, DuplicateGuard::new(store), submitter, config)
}
