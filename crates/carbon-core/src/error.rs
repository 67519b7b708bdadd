use thiserror::Error;

/// Error taxonomy for the carbon credit minting pipeline.
///
/// Variants fall into three groups that callers must treat differently:
/// retryable (`SourceUnavailable`), ambiguous (`BroadcastUncertain`,
/// `ConfirmationTimeout`) and everything else, which is fatal for the run.
#[derive(Debug, Error)]
pub enum CarbonError {
    /// The measurement source could not be reached or answered with a 5xx.
    #[error("Measurement source unavailable: {0}")]
    SourceUnavailable(String),

    /// The measurement source refused the request (unknown system, bad period).
    #[error("Measurement source rejected request ({status}): {message}")]
    SourceRejected { status: u16, message: String },

    /// The measurement payload was malformed or missing the unit field.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The rounded quantity is zero or negative. Nothing to mint.
    #[error("Non-positive quantity: {units} rounds to nothing mintable")]
    NonPositiveQuantity { units: f64 },

    /// The scaled amount does not fit a uint256.
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    /// Malformed, mis-checksummed, or zero recipient address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The node refused the transaction before accepting it (nonce, fee, gas estimation).
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// The raw transaction may or may not have reached the node.
    #[error("Broadcast of {tx_hash} uncertain: {reason}")]
    BroadcastUncertain { tx_hash: String, reason: String },

    /// No receipt observed within the confirmation window.
    #[error("No confirmation for {tx_hash} after {waited_secs}s")]
    ConfirmationTimeout { tx_hash: String, waited_secs: u64 },

    /// The transaction was mined with a failed status.
    #[error("Execution reverted: {tx_hash} in block {block_number}")]
    ExecutionReverted { tx_hash: String, block_number: u64 },

    /// A read-only ledger call failed (transport or node error).
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Reservation store failure (RocksDB, lock contention).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key parsing or signing failure.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CarbonError {
    /// Whether the operation may be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CarbonError::SourceUnavailable(_))
    }

    /// Whether the on-chain outcome is unknown and must be reconciled
    /// against ledger state before any retry.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            CarbonError::BroadcastUncertain { .. } | CarbonError::ConfirmationTimeout { .. }
        )
    }

    /// Whether a reservation taken for the failed submission can be released.
    ///
    /// True only when nothing was sent or the ledger reported the outcome.
    pub fn releases_reservation(&self) -> bool {
        matches!(
            self,
            CarbonError::InvalidAddress(_)
                | CarbonError::SubmissionRejected(_)
                | CarbonError::ExecutionReverted { .. }
                | CarbonError::AmountOutOfRange(_)
                | CarbonError::Crypto(_)
                | CarbonError::LedgerUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for CarbonError {
    fn from(e: serde_json::Error) -> Self {
        CarbonError::Serialization(e.to_string())
    }
}

impl From<k256::ecdsa::Error> for CarbonError {
    fn from(e: k256::ecdsa::Error) -> Self {
        CarbonError::Crypto(e.to_string())
    }
}
