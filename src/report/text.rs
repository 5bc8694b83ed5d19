use super::ResultReporter;
use crate::runner::{MigrationOutcome, MigrationSummary, OutcomeKind};
use std::fmt::Write;

/// Plain text summary for terminals and logs.
#[derive(Debug, Clone, Default)]
pub struct TextReporter {
    verbose: bool,
}

impl TextReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also list every record's outcome, not only failures.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl ResultReporter for TextReporter {
    fn render(&self, summary: &MigrationSummary) -> String {
        let mut out = String::new();
        let mode = if summary.dry_run() { "dry-run" } else { "live" };

        // Writing into a String cannot fail.
        let _ = writeln!(out, "migration: {} ({mode})", summary.migration());
        let _ = writeln!(out, "source: {}", summary.source());
        let _ = writeln!(out, "records: {}", summary.total());
        for kind in [OutcomeKind::Unchanged, OutcomeKind::Patched, OutcomeKind::Failed] {
            let _ = writeln!(out, "  {kind}: {}", summary.count(kind));
        }
        if summary.is_aborted() {
            let _ = writeln!(out, "status: aborted");
        }
        if summary.is_cancelled() {
            let _ = writeln!(out, "status: cancelled");
        }

        let failures: Vec<&MigrationOutcome> = summary.failures().collect();
        if !failures.is_empty() {
            let _ = writeln!(out, "failures:");
            for outcome in failures {
                let reason = outcome
                    .failure_reason()
                    .map(|reason| reason.to_string())
                    .unwrap_or_default();
                let _ = write!(out, "  {} {reason}", outcome.record_id);
                if let Some(detail) = &outcome.detail {
                    let _ = write!(out, ": {detail}");
                }
                out.push('\n');
            }
        }

        if self.verbose && summary.total() > 0 {
            let _ = writeln!(out, "outcomes:");
            for outcome in summary.outcomes() {
                let _ = write!(out, "  {} {}", outcome.record_id, outcome.kind());
                if let Some(detail) = &outcome.detail {
                    let _ = write!(out, ": {detail}");
                }
                out.push('\n');
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Patch, RecordId};
    use crate::report::exit_status;
    use crate::runner::FailureReason;
    use crate::runner::outcome::SummaryAccumulator;
    use serde_json::json;

    fn summary(aborted: bool) -> MigrationSummary {
        let mut acc = SummaryAccumulator::new("rest-day-methods", "collection:routines", false);
        acc.record(MigrationOutcome::patched(
            RecordId::new("a"),
            Patch::new().set("methods", json!([])),
            "set methods",
        ));
        acc.record(MigrationOutcome::unchanged(RecordId::new("b")));
        acc.record(MigrationOutcome::failed(
            RecordId::new("c"),
            FailureReason::Conflict,
            "version mismatch",
        ));
        if aborted {
            acc.mark_aborted();
        }
        acc.finish()
    }

    #[test]
    fn test_renders_counts_and_failures() {
        let text = TextReporter::new().render(&summary(false));
        assert_eq!(
            text,
            "migration: rest-day-methods (live)\n\
             source: collection:routines\n\
             records: 3\n  \
             unchanged: 1\n  \
             patched: 1\n  \
             failed: 1\n\
             failures:\n  \
             c conflict: version mismatch\n"
        );
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let summary = summary(true);
        let reporter = TextReporter::new().verbose(true);
        let first = reporter.render(&summary);
        assert_eq!(first, reporter.render(&summary));
        assert!(first.contains("status: aborted"));
        assert!(first.contains("  a patched: set methods\n"));
        assert!(first.contains("  b unchanged\n"));
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(&summary(false)), 1);

        let mut acc = SummaryAccumulator::new("rest-day-methods", "fixture.json", true);
        acc.record(MigrationOutcome::unchanged(RecordId::new("a")));
        assert_eq!(exit_status(&acc.finish()), 0);

        let mut acc = SummaryAccumulator::new("rest-day-methods", "fixture.json", false);
        acc.mark_cancelled();
        assert_eq!(exit_status(&acc.finish()), 1);
    }
}
