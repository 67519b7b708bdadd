// crates/carbon-cli/src/commands/mod.rs
//
// Command module declarations and the component wiring they share.

pub mod balance;
pub mod measure;
pub mod mint;
pub mod reconcile;
pub mod reservations;
pub mod token;

use std::sync::Arc;

use carbon_core::{Address, CarbonError};
use carbon_ledger::{ContractLedger, JsonRpcClient, TokenContract};
use carbon_pipeline::{
    DuplicateGuard, HttpMeasurementSource, MintPipeline, MintSubmitter, PipelineConfig,
};
use carbon_store::RocksReservationStore;

use crate::config::{signer_from_env, MinterConfig};
use crate::error::CliError;

/// Read-only view of the token contract. Needs no key.
pub fn token_contract(config: &MinterConfig) -> Result<TokenContract, CliError> {
    let address = config.contract_address()?;
    let rpc = JsonRpcClient::new(&config.rpc_url, config.rpc_timeout())
        .map_err(|e| CliError::Config(format!("RPC client for {}: {}", config.rpc_url, e)))?;
    Ok(TokenContract::new(rpc, address))
}

/// The token contract with the owner key attached.
pub fn contract_ledger(config: &MinterConfig) -> Result<ContractLedger, CliError> {
    let token = token_contract(config)?;
    let signer = signer_from_env()?;
    tracing::info!("Signing as {}", signer.address());
    Ok(ContractLedger::new(
        token,
        signer,
        config.chain_id,
        config.gas_buffer,
    ))
}

pub fn measurement_source(config: &MinterConfig) -> Result<HttpMeasurementSource, CliError> {
    Ok(HttpMeasurementSource::new(
        &config.source_url,
        config.source_timeout(),
        config.retry_policy(),
    )?)
}

/// Open the reservation database, waiting out another run's lock.
pub async fn open_store(config: &MinterConfig) -> Result<RocksReservationStore, CliError> {
    let path = config.store_path();
    if let Some(parent) = std::path::Path::new(&path).parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            CarbonError::Storage(format!("Cannot create {}: {}", parent.display(), e))
        })?;
    }
    let attempts = config.store_open_attempts;
    let delay = config.store_open_delay();
    let store = tokio::task::spawn_blocking(move || {
        RocksReservationStore::open_with_retry(&path, attempts, delay)
    })
    .await
    .map_err(|e| CarbonError::Storage(format!("Store open task failed: {}", e)))??;
    Ok(store)
}

/// Assemble the full pipeline for `recipient`.
pub async fn pipeline(config: &MinterConfig, recipient: Address) -> Result<MintPipeline, CliError> {
    // Key and contract problems surface before the store lock is taken.
    let ledger = Arc::new(contract_ledger(config)?);
    let source = Arc::new(measurement_source(config)?);
    let store = Arc::new(open_store(config).await?);

    let submitter = MintSubmitter::new(ledger, config.submitter_config());
    Ok(MintPipeline::new(
        source,
        DuplicateGuard::new(store),
        submitter,
        PipelineConfig {
            recipient,
            decimals: config.decimals,
            reconcile_grace: config.reconcile_grace(),
            reconcile_first: true,
        },
    ))
}
