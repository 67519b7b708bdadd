// crates/carbon-cli/src/commands/balance.rs
//
// `carbon-minter balance`: token balance of an account.

use clap::Args;
use serde_json::json;

use carbon_core::units::format_units;
use carbon_core::Address;

use crate::config::MinterConfig;
use crate::error::{CliError, EXIT_OK};
use crate::output::{emit, FieldRow, OutputFormat};

#[derive(Debug, Args)]
pub struct BalanceCmd {
    /// Account to query.
    #[arg(long)]
    pub address: Address,

    /// Print the balance as JSON.
    #[arg(long)]
    pub json: bool,
}

pub async fn run(cmd: &BalanceCmd, config: &MinterConfig) -> Result<u8, CliError> {
    let token = super::token_contract(config)?;
    let balance = token.balance_of(&cmd.address).await?;
    let decimals = match config.decimals {
        Some(decimals) => decimals,
        None => token.decimals().await?,
    };

    let value = json!({
        "address": cmd.address,
        "balance_base_units": balance.to_string(),
        "balance": format_units(&balance, decimals),
        "decimals": decimals,
    });
    let rows = vec![
        FieldRow::new("Address", cmd.address),
        FieldRow::new("Balance", format_units(&balance, decimals)),
        FieldRow::new("Base units", &balance),
    ];
    emit(OutputFormat::from_json_flag(cmd.json), &value, &rows);
    Ok(EXIT_OK)
}
