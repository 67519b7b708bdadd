// crates/carbon-cli/src/commands/reservations.rs
//
// `carbon-minter reservations`: list duplicate-guard records.

use clap::Args;
use tabled::Tabled;

use carbon_core::units::format_units;
use carbon_core::Reservation;
use carbon_core::ReservationStore;

use crate::config::MinterConfig;
use crate::error::{CliError, EXIT_OK};
use crate::output::{emit, OutputFormat};

#[derive(Debug, Args)]
pub struct ReservationsCmd {
    /// Only show records that are not yet confirmed.
    #[arg(long)]
    pub unconfirmed: bool,

    /// Print the records as JSON.
    #[arg(long)]
    pub json: bool,
}

/// A row in the reservations table.
#[derive(Tabled)]
struct ReservationRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "State")]
    state: &'static str,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Recipient")]
    recipient: String,
    #[tabled(rename = "Transaction")]
    transaction: String,
    #[tabled(rename = "Block")]
    block: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&Reservation> for ReservationRow {
    fn from(r: &Reservation) -> Self {
        Self {
            key: r.key.to_string(),
            state: r.state.tag(),
            amount: format_units(&r.request.amount_base_units, r.request.decimals),
            recipient: r.request.recipient.to_string(),
            transaction: r.transaction_hash().unwrap_or("-").to_string(),
            block: r
                .receipt()
                .map(|receipt| receipt.block_number.to_string())
                .unwrap_or_else(|| "-".to_string()),
            updated: r.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub async fn run(cmd: &ReservationsCmd, config: &MinterConfig) -> Result<u8, CliError> {
    let store = super::open_store(config).await?;
    let reservations = if cmd.unconfirmed {
        store.list_unconfirmed().await?
    } else {
        store.list().await?
    };

    let format = OutputFormat::from_json_flag(cmd.json);
    if format == OutputFormat::Table && reservations.is_empty() {
        println!("No reservations in {}", store.path());
        return Ok(EXIT_OK);
    }

    let rows: Vec<ReservationRow> = reservations.iter().map(ReservationRow::from).collect();
    emit(format, &reservations, &rows);
    Ok(EXIT_OK)
}
