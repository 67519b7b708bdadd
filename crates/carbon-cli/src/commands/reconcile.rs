// crates/carbon-cli/src/commands/reconcile.rs
//
// `carbon-minter reconcile`: resolve reservations left by earlier runs.

use std::sync::Arc;

use clap::Args;
use tabled::Tabled;

use carbon_pipeline::{DuplicateGuard, ReconcileReport};

use crate::config::MinterConfig;
use crate::error::{CliError, EXIT_OK, EXIT_PENDING};
use crate::output::{emit, OutputFormat};

#[derive(Debug, Args)]
pub struct ReconcileCmd {
    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ResolutionRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Resolution")]
    resolution: &'static str,
}

fn rows(report: &ReconcileReport) -> Vec<ResolutionRow> {
    let tagged = [
        (&report.confirmed, "confirmed"),
        (&report.released, "released"),
        (&report.pending, "pending"),
    ];
    tagged
        .into_iter()
        .flat_map(|(keys, resolution)| {
            keys.iter().map(move |key| ResolutionRow {
                key: key.to_string(),
                resolution,
            })
        })
        .collect()
}

pub async fn run(cmd: &ReconcileCmd, config: &MinterConfig) -> Result<u8, CliError> {
    let ledger = super::contract_ledger(config)?;
    let store = Arc::new(super::open_store(config).await?);
    let guard = DuplicateGuard::new(store);

    let report = guard.reconcile(&ledger, config.reconcile_grace()).await?;

    let format = OutputFormat::from_json_flag(cmd.json);
    if format == OutputFormat::Table && report.examined() == 0 {
        println!("No unconfirmed reservations.");
    } else {
        emit(format, &report, &rows(&report));
    }

    Ok(if report.is_clean() { EXIT_OK } else { EXIT_PENDING })
}
