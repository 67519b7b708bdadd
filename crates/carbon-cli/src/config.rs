// crates/carbon-cli/src/config.rs
//
// Runtime configuration for the carbon minter.
// Loaded from a TOML file or populated with defaults, then overridden by
// environment variables. The signing key is never part of the file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use carbon_core::Address;
use carbon_ledger::{LocalSigner, DEFAULT_GAS_BUFFER};
use carbon_pipeline::{RetryPolicy, SubmitterConfig};

use crate::error::CliError;

/// Environment variables holding the contract owner's key, in lookup order.
pub const PRIVATE_KEY_VARS: [&str; 2] = ["CARBON_MINTER_PRIVATE_KEY", "PRIVATE_KEY"];

#[derive(Debug, Clone, Deserialize)]
pub struct MinterConfig {
    /// Base URL of the Carbon API.
    #[serde(default = "default_source_url")]
    pub source_url: String,

    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    /// Total attempts per measurement fetch, including the first.
    #[serde(default = "default_source_max_attempts")]
    pub source_max_attempts: u32,

    #[serde(default = "default_source_retry_delay_ms")]
    pub source_retry_delay_ms: u64,

    #[serde(default = "default_source_max_retry_delay_ms")]
    pub source_max_retry_delay_ms: u64,

    /// Ethereum JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,

    /// Token contract address. Required for every ledger command.
    #[serde(default)]
    pub contract_address: Option<String>,

    /// Pin the chain id instead of asking the node.
    #[serde(default)]
    pub chain_id: Option<u64>,

    /// Pin the token precision instead of reading `decimals()`.
    #[serde(default)]
    pub decimals: Option<u8>,

    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Gas added on top of `eth_estimateGas`.
    #[serde(default = "default_gas_buffer")]
    pub gas_buffer: u64,

    /// Account credited by `mint`. No default.
    #[serde(default)]
    pub recipient: Option<String>,

    /// Directory holding the reservation database.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Age after which an untraceable reservation is released.
    #[serde(default = "default_reconcile_grace_secs")]
    pub reconcile_grace_secs: u64,

    /// Log level: "trace", "debug", "info", "warn", "error". `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Attempts to open the reservation database while another run holds it.
    #[serde(default = "default_store_open_attempts")]
    pub store_open_attempts: u32,

    #[serde(default = "default_store_open_delay_ms")]
    pub store_open_delay_ms: u64,
}

fn default_source_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_source_timeout_secs() -> u64 {
    10
}

fn default_source_max_attempts() -> u32 {
    4
}

fn default_source_retry_delay_ms() -> u64 {
    500
}

fn default_source_max_retry_delay_ms() -> u64 {
    8_000
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

fn default_confirmations() -> u64 {
    1
}

fn default_confirmation_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_gas_buffer() -> u64 {
    DEFAULT_GAS_BUFFER
}

fn default_data_dir() -> String {
    "~/.carbon-minter/data".to_string()
}

fn default_reconcile_grace_secs() -> u64 {
    900
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_store_open_attempts() -> u32 {
    20
}

fn default_store_open_delay_ms() -> u64 {
    500
}

impl Default for MinterConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            source_timeout_secs: default_source_timeout_secs(),
            source_max_attempts: default_source_max_attempts(),
            source_retry_delay_ms: default_source_retry_delay_ms(),
            source_max_retry_delay_ms: default_source_max_retry_delay_ms(),
            rpc_url: default_rpc_url(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
            contract_address: None,
            chain_id: None,
            decimals: None,
            confirmations: default_confirmations(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            gas_buffer: default_gas_buffer(),
            recipient: None,
            data_dir: default_data_dir(),
            reconcile_grace_secs: default_reconcile_grace_secs(),
            log_level: default_log_level(),
            store_open_attempts: default_store_open_attempts(),
            store_open_delay_ms: default_store_open_delay_ms(),
        }
    }
}

impl MinterConfig {
    /// Parse a TOML file. Missing fields take their defaults.
    pub fn load(path: &str) -> Result<Self, CliError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("Cannot read {}: {}", path, e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, CliError> {
        toml::from_str(contents).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Load `path` if it exists, otherwise start from defaults; then apply
    /// environment overrides.
    pub fn resolve(path: &str) -> Result<Self, CliError> {
        let expanded = expand_tilde(path);
        let mut config = if Path::new(&expanded).exists() {
            Self::load(&expanded)?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which one run could undo another's work.
    pub fn validate(&self) -> Result<(), CliError> {
        // A reconcile pass must not release a reservation whose run is still
        // waiting for its receipt.
        if self.reconcile_grace_secs <= self.confirmation_timeout_secs {
            return Err(CliError::Config(format!(
                "reconcile_grace_secs ({}) must exceed confirmation_timeout_secs ({})",
                self.reconcile_grace_secs, self.confirmation_timeout_secs
            )));
        }
        Ok(())
    }

    /// Apply `CARBON_*` overrides using `lookup` to read variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("CARBON_SOURCE_URL") {
            self.source_url = url;
        }
        if let Some(url) = non_empty("CARBON_RPC_URL") {
            self.rpc_url = url;
        }
        if let Some(address) = non_empty("CARBON_CONTRACT_ADDRESS") {
            self.contract_address = Some(address);
        }
        if let Some(address) = non_empty("CARBON_RECIPIENT") {
            self.recipient = Some(address);
        }
        if let Some(dir) = non_empty("CARBON_DATA_DIR") {
            self.data_dir = dir;
        }
    }

    pub fn contract_address(&self) -> Result<Address, CliError> {
        let raw = self.contract_address.as_deref().ok_or_else(|| {
            CliError::Config(
                "contract_address is not set (config file or CARBON_CONTRACT_ADDRESS)".to_string(),
            )
        })?;
        parse_address("contract_address", raw)
    }

    /// Recipient for `mint`: the command-line value wins over configuration.
    pub fn recipient(&self, flag: Option<&str>) -> Result<Address, CliError> {
        let raw = flag.or(self.recipient.as_deref()).ok_or_else(|| {
            CliError::Config(
                "No recipient: pass --recipient, set recipient, or CARBON_RECIPIENT".to_string(),
            )
        })?;
        let address = parse_address("recipient", raw)?;
        if address.is_zero() {
            return Err(CliError::Config("recipient is the zero address".to_string()));
        }
        Ok(address)
    }

    /// Path of the reservation database under `data_dir`.
    pub fn store_path(&self) -> String {
        format!("{}/reservations", expand_tilde(&self.data_dir))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.source_max_attempts.max(1),
            base_delay: Duration::from_millis(self.source_retry_delay_ms),
            max_delay: Duration::from_millis(self.source_max_retry_delay_ms),
        }
    }

    pub fn submitter_config(&self) -> SubmitterConfig {
        SubmitterConfig {
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            confirmations: self.confirmations.max(1),
        }
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn reconcile_grace(&self) -> Duration {
        Duration::from_secs(self.reconcile_grace_secs)
    }

    pub fn store_open_delay(&self) -> Duration {
        Duration::from_millis(self.store_open_delay_ms)
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, CliError> {
    raw.parse()
        .map_err(|e| CliError::Config(format!("{}: {}", field, e)))
}

/// Load the owner key from the environment.
///
/// The hex string is dropped as soon as the signer is built and never
/// appears in errors or logs.
pub fn signer_from_env() -> Result<LocalSigner, CliError> {
    signer_from(|name| std::env::var(name).ok())
}

pub fn signer_from(lookup: impl Fn(&str) -> Option<String>) -> Result<LocalSigner, CliError> {
    let secret = PRIVATE_KEY_VARS
        .iter()
        .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        .ok_or_else(|| {
            CliError::Config(format!(
                "No signing key: set {} (or {})",
                PRIVATE_KEY_VARS[0], PRIVATE_KEY_VARS[1]
            ))
        })?;
    LocalSigner::from_hex(secret.trim()).map_err(|e| CliError::Config(e.to_string()))
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.display().to_string();
        }
    }
    path.to_string()
}
