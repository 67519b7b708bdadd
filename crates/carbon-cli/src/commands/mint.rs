// crates/carbon-cli/src/commands/mint.rs
//
// `carbon-minter mint`: reconcile, then mint the current window's reading once.

use clap::Args;
use serde_json::json;

use carbon_core::units::format_units;
use carbon_core::PeriodType;
use carbon_pipeline::PipelineOutcome;

use crate::config::MinterConfig;
use crate::error::{CliError, EXIT_OK, EXIT_PENDING};
use crate::output::{emit, FieldRow, OutputFormat};

#[derive(Debug, Args)]
pub struct MintCmd {
    /// Capture system identifier, e.g. AC:XX0001.
    #[arg(long)]
    pub system: String,

    /// Measurement period: day, week, or month.
    #[arg(long, default_value = "day")]
    pub period: PeriodType,

    /// Override the configured recipient address.
    #[arg(long)]
    pub recipient: Option<String>,

    /// Print the outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

pub async fn run(cmd: &MintCmd, config: &MinterConfig) -> Result<u8, CliError> {
    let recipient = config.recipient(cmd.recipient.as_deref())?;
    let pipeline = super::pipeline(config, recipient).await?;
    let outcome = pipeline.run(&cmd.system, cmd.period).await?;

    let format = OutputFormat::from_json_flag(cmd.json);
    let code = match &outcome {
        PipelineOutcome::InFlight { .. } => EXIT_PENDING,
        _ => EXIT_OK,
    };
    let (value, rows) = describe(&outcome);
    emit(format, &value, &rows);
    Ok(code)
}

fn describe(outcome: &PipelineOutcome) -> (serde_json::Value, Vec<FieldRow>) {
    match outcome {
        PipelineOutcome::NothingToMint { measurement } => (
            json!({
                "outcome": "nothing_to_mint",
                "system": measurement.system_identifier,
                "simulated_units": measurement.simulated_units,
            }),
            vec![
                FieldRow::new("Outcome", "nothing to mint"),
                FieldRow::new("System", &measurement.system_identifier),
                FieldRow::new("Units", measurement.simulated_units),
            ],
        ),
        PipelineOutcome::Minted {
            key,
            request,
            receipt,
        } => (
            json!({
                "outcome": "minted",
                "key": key,
                "request": request,
                "receipt": receipt,
            }),
            vec![
                FieldRow::new("Outcome", "minted"),
                FieldRow::new("Key", key),
                FieldRow::new("Recipient", request.recipient),
                FieldRow::new(
                    "Amount",
                    format_units(&request.amount_base_units, request.decimals),
                ),
                FieldRow::new("Transaction", &receipt.transaction_hash),
                FieldRow::new("Block", receipt.block_number),
            ],
        ),
        PipelineOutcome::AlreadyMinted { key, receipt } => (
            json!({
                "outcome": "already_minted",
                "key": key,
                "receipt": receipt,
            }),
            vec![
                FieldRow::new("Outcome", "already minted"),
                FieldRow::new("Key", key),
                FieldRow::new("Transaction", &receipt.transaction_hash),
                FieldRow::new("Block", receipt.block_number),
            ],
        ),
        PipelineOutcome::InFlight { key, reservation } => (
            json!({
                "outcome": "in_flight",
                "key": key,
                "reservation": reservation,
            }),
            vec![
                FieldRow::new("Outcome", "in flight"),
                FieldRow::new("Key", key),
                FieldRow::new("State", reservation.state.tag()),
                FieldRow::new(
                    "Transaction",
                    reservation.transaction_hash().unwrap_or("-"),
                ),
            ],
        ),
    }
}
