use super::ResultReporter;
use crate::runner::MigrationSummary;

/// Pretty-printed JSON form of the full summary.
#[derive(Debug, Clone, Default)]
pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }
}

impl ResultReporter for JsonReporter {
    fn render(&self, summary: &MigrationSummary) -> String {
        match serde_json::to_string_pretty(summary) {
            Ok(json) => json,
            Err(err) => format!("{{\"error\": \"failed to serialize summary: {err}\"}}"),
        }
    }
}
