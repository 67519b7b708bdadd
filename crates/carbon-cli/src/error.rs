// crates/carbon-cli/src/error.rs
//
// CLI error type and the process exit codes it maps to.

use carbon_core::CarbonError;
use thiserror::Error;

pub const EXIT_OK: u8 = 0;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_FATAL: u8 = 3;
/// A transaction outcome is unknown or another run holds the window.
pub const EXIT_PENDING: u8 = 4;
/// EX_TEMPFAIL: the measurement source could not be reached; rerun later.
pub const EXIT_UNAVAILABLE: u8 = 75;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Carbon(#[from] CarbonError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) => EXIT_CONFIG,
            CliError::Carbon(CarbonError::Config(_)) => EXIT_CONFIG,
            CliError::Carbon(CarbonError::SourceUnavailable(_)) => EXIT_UNAVAILABLE,
            CliError::Carbon(e) if e.is_ambiguous() => EXIT_PENDING,
            CliError::Carbon(_) => EXIT_FATAL,
        }
    }
}
