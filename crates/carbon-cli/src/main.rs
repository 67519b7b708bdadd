// crates/carbon-cli/src/main.rs
//
// CLI entrypoint for the carbon credit minter.
//
// Loads configuration, initializes tracing, and dispatches to one
// subcommand. Each command returns a process exit code; failures are
// mapped to codes by `CliError::exit_code`.

mod commands;
mod config;
mod error;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::balance::BalanceCmd;
use commands::measure::MeasureCmd;
use commands::mint::MintCmd;
use commands::reconcile::ReconcileCmd;
use commands::reservations::ReservationsCmd;
use commands::token::TokenCmd;
use config::MinterConfig;
use error::CliError;

/// Carbon credit minter: turns capture readings into on-chain mints, once per window.
#[derive(Parser, Debug)]
#[command(
    name = "carbon-minter",
    version = "0.1.0",
    about = "Mint carbon credit tokens from Carbon API readings, at most once per period window"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "~/.carbon-minter/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile, then mint the current reading for a system.
    Mint(MintCmd),

    /// Resolve reservations left unconfirmed by earlier runs.
    Reconcile(ReconcileCmd),

    /// List duplicate-guard records.
    Reservations(ReservationsCmd),

    /// Fetch and convert a reading without minting.
    Measure(MeasureCmd),

    /// Show token name, symbol, decimals and total supply.
    Token(TokenCmd),

    /// Show the token balance of an address.
    Balance(BalanceCmd),
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(command: &Commands, config: &MinterConfig) -> Result<u8, CliError> {
    match command {
        Commands::Mint(cmd) => commands::mint::run(cmd, config).await,
        Commands::Reconcile(cmd) => commands::reconcile::run(cmd, config).await,
        Commands::Reservations(cmd) => commands::reservations::run(cmd, config).await,
        Commands::Measure(cmd) => commands::measure::run(cmd, config).await,
        Commands::Token(cmd) => commands::token::run(cmd, config).await,
        Commands::Balance(cmd) => commands::balance::run(cmd, config).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match MinterConfig::resolve(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            tracing::error!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };
    init_tracing(&config.log_level);
    tracing::debug!("Configuration resolved from {}", cli.config);

    match dispatch(&cli.command, &config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
