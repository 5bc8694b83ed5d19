use super::migrate::record_outcome;
use super::outcome::SummaryAccumulator;
use super::{CancelFlag, MigrationError, MigrationOutcome, MigrationResult, MigrationRunner, MigrationSummary};
use crate::core::{Patch, Record};
use crate::source::RecordSource;
use tracing::{Instrument, Level, event, info_span};

impl MigrationRunner {
    /// Makes the store contain every fixture record.
    ///
    /// Absent records are inserted and present ones get a merge of the fields
    /// that differ from the fixture. Records whose stored fields already match
    /// are `unchanged`, and fields missing from the fixture are left alone, so
    /// seeding twice is a no-op. Nothing is ever deleted.
    ///
    /// Seeding writes one record at a time; `batch_size` does not apply.
    pub async fn seed(&self, fixture: &mut dyn RecordSource) -> MigrationResult<MigrationSummary> {
        self.seed_with_cancel(fixture, &CancelFlag::new()).await
    }

    /// Like [`seed`](Self::seed), stopping between records once `cancel` is set.
    pub async fn seed_with_cancel(
        &self,
        fixture: &mut dyn RecordSource,
        cancel: &CancelFlag,
    ) -> MigrationResult<MigrationSummary> {
        let origin = fixture.origin();
        let span = info_span!(
            "migration.seed",
            source = %origin,
            collection = %self.store().name(),
            dry_run = self.options().dry_run
        );
        self.seed_inner(fixture, origin, cancel)
            .instrument(span)
            .await
    }

    async fn seed_inner(
        &self,
        fixture: &mut dyn RecordSource,
        origin: String,
        cancel: &CancelFlag,
    ) -> MigrationResult<MigrationSummary> {
        let migration = format!("seed:{}", self.store().name());
        let mut acc = SummaryAccumulator::new(migration, origin, self.options().dry_run);
        event!(Level::INFO, run_id = %acc.run_id(), "seeding started");

        fixture.rewind();
        let mut stopped = false;
        // checked per record, so a flag raised after the last one leaves the run complete
        'pages: loop {
            let page = match fixture.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(error) if acc.total() == 0 => return Err(MigrationError::SourceUnavailable(error)),
                Err(error) => {
                    acc.mark_aborted();
                    return Err(MigrationError::SourceInterrupted {
                        error,
                        summary: Box::new(acc.finish()),
                    });
                }
            };

            for record in page {
                if cancel.is_cancelled() {
                    stopped = true;
                    break 'pages;
                }
                let outcome = self.seed_record(record).await;
                let failed = outcome.failure_reason().is_some();
                record_outcome(&mut acc, outcome);
                if failed && !self.options().continue_on_error {
                    acc.mark_aborted();
                    break 'pages;
                }
            }
        }

        if stopped {
            acc.mark_cancelled();
        }
        let summary = acc.finish();
        event!(
            Level::INFO,
            created_or_updated = summary.patched(),
            unchanged = summary.unchanged(),
            failed = summary.failed(),
            "seeding finished"
        );
        Ok(summary)
    }

    async fn seed_record(&self, record: Record) -> MigrationOutcome {
        let dry_run = self.options().dry_run;
        let existing = match self.store().get(&record.id).await {
            Ok(existing) => existing,
            Err(err) => return MigrationOutcome::store_failure(record.id, &err),
        };

        match existing {
            None => {
                let patch: Patch = record.fields.clone().into_iter().collect();
                if dry_run {
                    return MigrationOutcome::patched(record.id, patch, "would create");
                }
                match self.store().insert(&record).await {
                    Ok(()) => MigrationOutcome::patched(record.id, patch, "created"),
                    Err(err) => MigrationOutcome::store_failure(record.id, &err),
                }
            }
            Some(current) => {
                let patch = Patch::diff(&current.fields, &record.fields);
                if patch.is_empty() {
                    return MigrationOutcome::unchanged(record.id);
                }
                let fields = patch.field_names().collect::<Vec<_>>().join(", ");
                if dry_run {
                    return MigrationOutcome::patched(
                        record.id,
                        patch,
                        format!("would update {fields}"),
                    );
                }
                match self.store().merge(&record.id, &patch).await {
                    Ok(()) => MigrationOutcome::patched(record.id, patch, format!("updated {fields}")),
                    Err(err) => MigrationOutcome::store_failure(record.id, &err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{Record, RecordId, StoreError};
    use crate::runner::{CancelFlag, FailureReason, MigrationOptions, MigrationRunner};
    use crate::source::FileSource;
    use crate::storage::{MemoryStore, RecordStore};
    use serde_json::json;
    use std::sync::Arc;

    fn fixture() -> Vec<Record> {
        vec![
            Record::from_json("kb-1", json!({"title": "Warm up", "priority": 5})).unwrap(),
            Record::from_json("kb-2", json!({"title": "Cool down"})).unwrap(),
        ]
    }

    #[tokio::test]
    async fn test_seed_creates_then_is_idempotent() {
        let store = Arc::new(MemoryStore::new("knowledge_base"));
        let runner = MigrationRunner::new(store.clone(), MigrationOptions::default()).unwrap();

        let mut source = FileSource::from_records("kb.json", fixture());
        let first = runner.seed(&mut source).await.unwrap();
        assert_eq!(first.patched(), 2);
        assert_eq!(first.outcomes()[0].detail.as_deref(), Some("created"));
        assert_eq!(first.migration(), "seed:knowledge_base");

        let second = runner.seed(&mut source).await.unwrap();
        assert_eq!(second.unchanged(), 2);
        assert_eq!(second.patched(), 0);
    }

    #[tokio::test]
    async fn test_seed_updates_only_differing_fields() {
        let existing = Record::from_json(
            "kb-1",
            json!({"title": "Old title", "priority": 5, "views": 12}),
        )
        .unwrap();
        let store = Arc::new(MemoryStore::with_records("knowledge_base", vec![existing]));
        let runner = MigrationRunner::new(store.clone(), MigrationOptions::default()).unwrap();

        let mut source = FileSource::from_records("kb.json", fixture());
        let summary = runner.seed(&mut source).await.unwrap();
        let update = summary.outcome_for(&RecordId::new("kb-1")).unwrap();
        assert_eq!(update.detail.as_deref(), Some("updated title"));

        let stored = store.get(&RecordId::new("kb-1")).await.unwrap().unwrap();
        assert_eq!(stored.get("title"), Some(&json!("Warm up")));
        // fields absent from the fixture survive
        assert_eq!(stored.get("views"), Some(&json!(12)));
    }

    #[tokio::test]
    async fn test_seed_dry_run_writes_nothing() {
        let store = Arc::new(MemoryStore::new("knowledge_base"));
        let runner =
            MigrationRunner::new(store.clone(), MigrationOptions::default().dry_run(true)).unwrap();

        let mut source = FileSource::from_records("kb.json", fixture());
        let summary = runner.seed(&mut source).await.unwrap();
        assert_eq!(summary.patched(), 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_seed_aborts_on_first_failure_when_asked() {
        let existing = Record::from_json("kb-1", json!({"title": "Old"})).unwrap();
        let store = Arc::new(MemoryStore::with_records("knowledge_base", vec![existing]));
        store
            .fail_merges("kb-1", StoreError::conflict("version mismatch"))
            .await;
        let runner = MigrationRunner::new(
            store.clone(),
            MigrationOptions::default().continue_on_error(false),
        )
        .unwrap();

        let mut source = FileSource::from_records("kb.json", fixture());
        let summary = runner.seed(&mut source).await.unwrap();
        assert!(summary.is_aborted());
        assert_eq!(summary.total(), 1);
        assert_eq!(
            summary.outcomes()[0].failure_reason(),
            Some(FailureReason::Conflict)
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_cancelled_seed_leaves_runner_reusable() {
        let store = Arc::new(MemoryStore::new("knowledge_base"));
        let runner = MigrationRunner::new(store.clone(), MigrationOptions::default()).unwrap();
        let mut source = FileSource::from_records("kb.json", fixture());

        let flag = CancelFlag::new();
        flag.cancel();
        let stopped = runner.seed_with_cancel(&mut source, &flag).await.unwrap();
        assert!(stopped.is_cancelled());
        assert!(store.is_empty().await);

        let seeded = runner.seed(&mut source).await.unwrap();
        assert!(!seeded.is_cancelled());
        assert_eq!(seeded.patched(), 2);
    }
}
