// crates/carbon-cli/src/commands/measure.rs
//
// `carbon-minter measure`: fetch and convert a reading without reserving
// or submitting anything.

use clap::Args;
use serde_json::json;

use carbon_core::units::{format_units, round_units, scale_to_base_units, DEFAULT_DECIMALS};
use carbon_core::{CarbonError, MeasurementSource, PeriodType};

use crate::config::MinterConfig;
use crate::error::{CliError, EXIT_OK};
use crate::output::{emit, FieldRow, OutputFormat};

#[derive(Debug, Args)]
pub struct MeasureCmd {
    /// Capture system identifier, e.g. AC:XX0001.
    #[arg(long)]
    pub system: String,

    /// Measurement period: day, week, or month.
    #[arg(long, default_value = "day")]
    pub period: PeriodType,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Precision to preview with: configured, else the contract's, else 18.
async fn decimals(config: &MinterConfig) -> Result<u8, CliError> {
    if let Some(decimals) = config.decimals {
        return Ok(decimals);
    }
    if config.contract_address.is_none() {
        return Ok(DEFAULT_DECIMALS);
    }
    let token = super::token_contract(config)?;
    Ok(token.decimals().await?)
}

pub async fn run(cmd: &MeasureCmd, config: &MinterConfig) -> Result<u8, CliError> {
    let source = super::measurement_source(config)?;
    let measurement = source.fetch_measurement(&cmd.system, cmd.period).await?;
    let decimals = decimals(config).await?;

    let window = measurement.window();
    let mintable = match round_units(measurement.simulated_units) {
        Ok(whole) => Some((scale_to_base_units(&whole, decimals)?, whole)),
        Err(CarbonError::NonPositiveQuantity { .. }) => None,
        Err(e) => return Err(e.into()),
    };

    let value = json!({
        "measurement": measurement,
        "window": window,
        "decimals": decimals,
        "whole_units": mintable.as_ref().map(|(_, whole)| whole.to_string()),
        "amount_base_units": mintable.as_ref().map(|(amount, _)| amount.to_string()),
    });

    let mut rows = vec![
        FieldRow::new("System", &measurement.system_identifier),
        FieldRow::new(
            "Name",
            measurement.system_name.as_deref().unwrap_or("-"),
        ),
        FieldRow::new("Period", measurement.period_type),
        FieldRow::new("Observed at", measurement.observed_at_end_time.to_rfc3339()),
        FieldRow::new("Window", format!("{} .. {}", window.start, window.end)),
        FieldRow::new("Units", measurement.simulated_units),
    ];
    match &mintable {
        Some((amount, whole)) => {
            rows.push(FieldRow::new("Whole units", whole));
            rows.push(FieldRow::new("Amount", format_units(amount, decimals)));
            rows.push(FieldRow::new("Base units", amount));
        }
        None => rows.push(FieldRow::new("Amount", "nothing to mint")),
    }

    emit(OutputFormat::from_json_flag(cmd.json), &value, &rows);
    Ok(EXIT_OK)
}
