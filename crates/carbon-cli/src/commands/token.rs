// crates/carbon-cli/src/commands/token.rs
//
// `carbon-minter token`: read the token contract's metadata.

use clap::Args;

use carbon_core::units::format_units;

use crate::config::{signer_from_env, MinterConfig};
use crate::error::{CliError, EXIT_OK};
use crate::output::{emit, FieldRow, OutputFormat};

#[derive(Debug, Args)]
pub struct TokenCmd {
    /// Print the token info as JSON.
    #[arg(long)]
    pub json: bool,
}

pub async fn run(cmd: &TokenCmd, config: &MinterConfig) -> Result<u8, CliError> {
    let token = super::token_contract(config)?;
    let info = token.info().await?;

    let rows = vec![
        FieldRow::new("Address", info.address),
        FieldRow::new("Name", &info.name),
        FieldRow::new("Symbol", &info.symbol),
        FieldRow::new("Decimals", info.decimals),
        FieldRow::new(
            "Total supply",
            format!("{} {}", format_units(&info.total_supply, info.decimals), info.symbol),
        ),
    ];
    emit(OutputFormat::from_json_flag(cmd.json), &info, &rows);

    // Minting only works when the configured key owns the contract.
    if let Ok(signer) = signer_from_env() {
        match token.owner().await {
            Ok(owner) if owner != signer.address() => tracing::warn!(
                "Signing key {} is not the contract owner {}; mint will revert",
                signer.address(),
                owner
            ),
            Ok(_) => {}
            Err(e) => tracing::debug!("owner() unavailable: {}", e),
        }
    }

    Ok(EXIT_OK)
}
