//! Run summary rendering
//!
//! Reporters turn a finalized [`MigrationSummary`] into text. Rendering is
//! deterministic and read-only; timestamps and run ids only appear in the
//! JSON form.

mod json;
mod text;

pub use json::JsonReporter;
pub use text::TextReporter;

use crate::runner::MigrationSummary;
use std::str::FromStr;

pub trait ResultReporter {
    fn render(&self, summary: &MigrationSummary) -> String;
}

/// Process exit status for a finished run.
///
/// `0` when every record succeeded and the run completed, `1` when any record
/// failed or the run was aborted or cancelled.
pub fn exit_status(summary: &MigrationSummary) -> u8 {
    if summary.is_success() { 0 } else { 1 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown report format '{other}' (expected text or json)")),
        }
    }
}

impl ReportFormat {
    pub fn reporter(self, verbose: bool) -> Box<dyn ResultReporter> {
        match self {
            Self::Text => Box::new(TextReporter::new().verbose(verbose)),
            Self::Json => Box::new(JsonReporter::new()),
        }
    }
}
