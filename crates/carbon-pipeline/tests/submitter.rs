// crates/carbon-pipeline/tests/submitter.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;

use carbon_core::mint::{MintRequest, ReceiptStatus};
use carbon_core::{Address, CarbonError};
use carbon_pipeline::{MintSubmitter, SubmitterConfig};

use common::*;

fn request(to: Address) -> MintRequest {
    MintRequest {
        recipient: to,
        amount_base_units: BigUint::from(3u32) * BigUint::from(10u32).pow(18),
        system_identifier: SYSTEM.to_string(),
        whole_units: BigUint::from(3u32),
        decimals: 18,
    }
}

#[tokio::test]
async fn submit_returns_confirmed_receipt() {
    let ledger = Arc::new(FakeLedger::new());
    let submitter = MintSubmitter::new(ledger.clone(), fast_submitter_config());

    let receipt = submitter.submit(&request(recipient())).await.unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Confirmed);
    assert_eq!(receipt.block_number, 101);
    assert_eq!(ledger.mint_count(), 1);
}

#[tokio::test]
async fn zero_address_never_reaches_the_ledger() {
    let ledger = Arc::new(FakeLedger::new());
    let submitter = MintSubmitter::new(ledger.clone(), fast_submitter_config());

    let err = submitter.submit(&request(Address::ZERO)).await.unwrap_err();
    assert!(matches!(err, CarbonError::InvalidAddress(_)));
    assert_eq!(ledger.signed_count(), 0);
}

#[tokio::test]
async fn failed_receipt_is_execution_reverted() {
    let ledger = Arc::new(FakeLedger::new().with_receipt_mode(ReceiptMode::Revert));
    let submitter = MintSubmitter::new(ledger, fast_submitter_config());

    match submitter.submit(&request(recipient())).await.unwrap_err() {
        CarbonError::ExecutionReverted { block_number, .. } => assert_eq!(block_number, 101),
        other => panic!("Expected ExecutionReverted, got: {:?}", other),
    }
}

#[tokio::test]
async fn unmined_transaction_times_out() {
    let ledger = Arc::new(FakeLedger::new().with_receipt_mode(ReceiptMode::Never));
    let config = SubmitterConfig {
        confirmation_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(10),
        confirmations: 1,
    };
    let submitter = MintSubmitter::new(ledger, config);

    let err = submitter.submit(&request(recipient())).await.unwrap_err();
    assert!(matches!(err, CarbonError::ConfirmationTimeout { .. }));
    assert!(err.is_ambiguous());
}

#[tokio::test]
async fn waits_for_extra_confirmations() {
    let ledger = Arc::new(FakeLedger::new());
    ledger.state.lock().unwrap().advance_on_read = true;
    let config = SubmitterConfig {
        confirmations: 3,
        ..fast_submitter_config()
    };
    let submitter = MintSubmitter::new(ledger.clone(), config);

    let receipt = submitter.submit(&request(recipient())).await.unwrap();
    // Mined at 101; head had to reach 103 before the receipt counted.
    assert_eq!(receipt.block_number, 101);
    assert!(ledger.state.lock().unwrap().head >= 103);
}
