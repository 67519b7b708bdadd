// crates/carbon-pipeline/src/lib.rs
//
// carbon-pipeline: the minting flow assembled from carbon-core's seams.
//
// Reading Fetcher (Carbon API over HTTP) -> Unit Converter (carbon-core)
// -> Duplicate Guard (any ReservationStore) -> Mint Submitter (any MintLedger).

pub mod fetcher;
pub mod guard;
pub mod pipeline;
pub mod retry;
pub mod submitter;

pub use fetcher::HttpMeasurementSource;
pub use guard::{DuplicateGuard, ReconcileReport};
pub use pipeline::{MintPipeline, PipelineConfig, PipelineOutcome};
pub use retry::RetryPolicy;
pub use submitter::{MintSubmitter, SubmitterConfig};
