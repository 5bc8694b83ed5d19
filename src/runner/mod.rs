//! Migration runner
//!
//! Drives one classifier over every record a source yields and applies the
//! resulting patches through a [`RecordStore`](crate::storage::RecordStore).
//!
//! # Architecture
//!
//! - `options`: run configuration (dry run, batching, error policy)
//! - `outcome`: per-record outcomes and the finalized run summary
//! - `cancel`: cooperative cancellation flag
//! - `migrate`: the run loop itself
//! - `seed`: creating or updating records from a fixture
//!
//! A run never aborts on a record the classifier cannot handle; that record
//! is reported as `failed(unknown)`. Only store write failures can stop a run
//! early, and only when `continue_on_error` is off.

pub mod cancel;
pub mod migrate;
pub mod options;
pub mod outcome;
pub mod seed;

pub use cancel::CancelFlag;
pub use migrate::MigrationRunner;
pub use options::MigrationOptions;
pub use outcome::{
    FailureReason, MigrationOutcome, MigrationSummary, OutcomeKind, OutcomeStatus,
};

use crate::core::SourceError;
use thiserror::Error;

/// Errors that end a run without (or with only a partial) summary.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Invalid migration options: {0}")]
    InvalidOptions(String),

    /// The source failed before any record was processed.
    #[error(transparent)]
    SourceUnavailable(#[from] SourceError),

    /// The source failed mid-run. Work already committed stays committed.
    #[error("{error} (run stopped after {} records)", .summary.total())]
    SourceInterrupted {
        error: SourceError,
        summary: Box<MigrationSummary>,
    },
}

impl MigrationError {
    /// Summary of the records processed before the failure, if any were.
    pub fn partial_summary(&self) -> Option<&MigrationSummary> {
        match self {
            Self::SourceInterrupted { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

pub type MigrationResult<T> = std::result::Result<T, MigrationError>;
