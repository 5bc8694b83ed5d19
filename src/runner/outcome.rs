use crate::core::{Patch, RecordId, StoreError, StoreErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why a record ended up `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    NotFound,
    PermissionDenied,
    Conflict,
    Transient,
    Unknown,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "notFound",
            Self::PermissionDenied => "permissionDenied",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StoreErrorKind> for FailureReason {
    fn from(kind: StoreErrorKind) -> Self {
        match kind {
            StoreErrorKind::NotFound => Self::NotFound,
            StoreErrorKind::PermissionDenied => Self::PermissionDenied,
            StoreErrorKind::Conflict => Self::Conflict,
            StoreErrorKind::Transient => Self::Transient,
            StoreErrorKind::Unknown => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeKind {
    Unchanged,
    Patched,
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unchanged => "unchanged",
            Self::Patched => "patched",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum OutcomeStatus {
    Unchanged,
    Patched,
    Failed(FailureReason),
}

/// Result for one record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOutcome {
    pub record_id: RecordId,
    #[serde(flatten)]
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Patch applied (or, in a dry run, that would have been applied).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
}

impl MigrationOutcome {
    pub fn unchanged(record_id: RecordId) -> Self {
        Self {
            record_id,
            status: OutcomeStatus::Unchanged,
            detail: None,
            patch: None,
        }
    }

    pub fn patched(record_id: RecordId, patch: Patch, detail: impl Into<String>) -> Self {
        Self {
            record_id,
            status: OutcomeStatus::Patched,
            detail: Some(detail.into()),
            patch: Some(patch),
        }
    }

    pub fn failed(record_id: RecordId, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            record_id,
            status: OutcomeStatus::Failed(reason),
            detail: Some(detail.into()),
            patch: None,
        }
    }

    pub fn store_failure(record_id: RecordId, error: &StoreError) -> Self {
        Self::failed(record_id, error.kind.into(), error.message.clone())
    }

    pub fn kind(&self) -> OutcomeKind {
        match self.status {
            OutcomeStatus::Unchanged => OutcomeKind::Unchanged,
            OutcomeStatus::Patched => OutcomeKind::Patched,
            OutcomeStatus::Failed(_) => OutcomeKind::Failed,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self.status {
            OutcomeStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Finalized result of a run.
///
/// Only the runner builds summaries; once handed out they are read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    run_id: Uuid,
    migration: String,
    source: String,
    dry_run: bool,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    unchanged: usize,
    patched: usize,
    failed: usize,
    aborted: bool,
    cancelled: bool,
    outcomes: Vec<MigrationOutcome>,
}

impl MigrationSummary {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn migration(&self) -> &str {
        &self.migration
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        match kind {
            OutcomeKind::Unchanged => self.unchanged,
            OutcomeKind::Patched => self.patched,
            OutcomeKind::Failed => self.failed,
        }
    }

    pub fn unchanged(&self) -> usize {
        self.unchanged
    }

    pub fn patched(&self) -> usize {
        self.patched
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Stopped early on a write failure (or an interrupted source).
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn outcomes(&self) -> &[MigrationOutcome] {
        &self.outcomes
    }

    pub fn failures(&self) -> impl Iterator<Item = &MigrationOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.kind() == OutcomeKind::Failed)
    }

    pub fn outcome_for(&self, record_id: &RecordId) -> Option<&MigrationOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| &outcome.record_id == record_id)
    }

    /// Every record processed without failure and the run went to completion.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.aborted && !self.cancelled
    }
}

/// Mutable side of a summary, owned by the runner for one run.
#[derive(Debug)]
pub(crate) struct SummaryAccumulator {
    summary: MigrationSummary,
}

impl SummaryAccumulator {
    pub(crate) fn new(migration: impl Into<String>, source: impl Into<String>, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            summary: MigrationSummary {
                run_id: Uuid::new_v4(),
                migration: migration.into(),
                source: source.into(),
                dry_run,
                started_at: now,
                finished_at: now,
                unchanged: 0,
                patched: 0,
                failed: 0,
                aborted: false,
                cancelled: false,
                outcomes: Vec::new(),
            },
        }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.summary.run_id
    }

    pub(crate) fn record(&mut self, outcome: MigrationOutcome) {
        match outcome.kind() {
            OutcomeKind::Unchanged => self.summary.unchanged += 1,
            OutcomeKind::Patched => self.summary.patched += 1,
            OutcomeKind::Failed => self.summary.failed += 1,
        }
        self.summary.outcomes.push(outcome);
    }

    pub(crate) fn total(&self) -> usize {
        self.summary.outcomes.len()
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.summary.aborted = true;
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.summary.cancelled = true;
    }

    pub(crate) fn finish(mut self) -> MigrationSummary {
        self.summary.finished_at = Utc::now();
        self.summary
    }
}
