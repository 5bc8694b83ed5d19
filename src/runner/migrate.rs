use super::outcome::SummaryAccumulator;
use super::{
    CancelFlag, FailureReason, MigrationError, MigrationOptions, MigrationOutcome,
    MigrationResult, MigrationSummary,
};
use crate::classifier::{Classification, RecordClassifier};
use crate::core::{Patch, Record};
use crate::source::RecordSource;
use crate::storage::{PendingWrite, RecordStore};
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Outcome slot kept in source order until the batch holding it commits.
enum Slot {
    Resolved(MigrationOutcome),
    Write(PendingWrite),
}

/// What the caller should do after a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Abort,
}

/// Applies a classifier to every record of a source.
///
/// # Examples
///
/// ```no_run
/// use docmigrate::{
///     CollectionSource, MemoryStore, MigrationOptions, MigrationRunner,
///     RestDayMethodsClassifier,
/// };
/// use std::sync::Arc;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new("routines"));
/// let runner = MigrationRunner::new(store.clone(), MigrationOptions::default())?;
/// let mut source = CollectionSource::new(store);
/// let summary = runner.run(&mut source, &RestDayMethodsClassifier::new()).await?;
/// println!("{} patched", summary.patched());
/// # Ok(())
/// # }
/// ```
pub struct MigrationRunner {
    store: Arc<dyn RecordStore>,
    options: MigrationOptions,
}

impl MigrationRunner {
    pub fn new(store: Arc<dyn RecordStore>, options: MigrationOptions) -> MigrationResult<Self> {
        options.validate()?;
        Ok(Self { store, options })
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    pub(crate) fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Runs `classifier` over every record of `source`, from its first record.
    ///
    /// Every record the source yields gets exactly one outcome, in source
    /// order. Records that classify as no-change are never written. In a dry
    /// run nothing is written at all and would-be patches are reported as
    /// `patched`.
    pub async fn run(
        &self,
        source: &mut dyn RecordSource,
        classifier: &dyn RecordClassifier,
    ) -> MigrationResult<MigrationSummary> {
        self.run_with_cancel(source, classifier, &CancelFlag::new())
            .await
    }

    /// Like [`run`](Self::run), stopping between records once `cancel` is set.
    ///
    /// The flag belongs to this call only. A run that stopped early reports
    /// `cancelled`; a flag raised after the last record was classified does
    /// not mark the run.
    pub async fn run_with_cancel(
        &self,
        source: &mut dyn RecordSource,
        classifier: &dyn RecordClassifier,
        cancel: &CancelFlag,
    ) -> MigrationResult<MigrationSummary> {
        let origin = source.origin();
        let span = info_span!(
            "migration.run",
            migration = %classifier.name(),
            source = %origin,
            dry_run = self.options.dry_run,
            batch_size = self.options.batch_size
        );
        self.run_inner(source, classifier, origin, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        source: &mut dyn RecordSource,
        classifier: &dyn RecordClassifier,
        origin: String,
        cancel: &CancelFlag,
    ) -> MigrationResult<MigrationSummary> {
        let mut acc = SummaryAccumulator::new(classifier.name(), origin, self.options.dry_run);
        event!(Level::INFO, run_id = %acc.run_id(), "migration started");

        source.rewind();
        let mut pending: Vec<Slot> = Vec::new();
        let mut pending_writes = 0usize;
        let mut stopped = false;

        // checked per record, so a flag raised after the last one leaves the run complete
        'pages: loop {
            let page = match source.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break 'pages,
                Err(error) => {
                    if acc.total() == 0 && pending.is_empty() {
                        event!(Level::ERROR, error = %error, "source unavailable");
                        return Err(MigrationError::SourceUnavailable(error));
                    }
                    self.flush(&mut pending, &mut acc).await;
                    acc.mark_aborted();
                    let summary = acc.finish();
                    event!(
                        Level::ERROR,
                        error = %error,
                        processed = summary.total(),
                        "source interrupted"
                    );
                    return Err(MigrationError::SourceInterrupted {
                        error,
                        summary: Box::new(summary),
                    });
                }
            };

            for record in page {
                if cancel.is_cancelled() {
                    stopped = true;
                    break 'pages;
                }

                match self.classify(classifier, &record) {
                    Step::Done(outcome) if pending.is_empty() => record_outcome(&mut acc, outcome),
                    Step::Done(outcome) => pending.push(Slot::Resolved(outcome)),
                    Step::Write(write) => {
                        pending.push(Slot::Write(write));
                        pending_writes += 1;
                        if pending_writes >= self.options.batch_size {
                            pending_writes = 0;
                            if self.flush(&mut pending, &mut acc).await == Flow::Abort {
                                acc.mark_aborted();
                                break 'pages;
                            }
                        }
                    }
                }
            }
        }

        if !pending.is_empty() && self.flush(&mut pending, &mut acc).await == Flow::Abort {
            acc.mark_aborted();
        }
        if stopped {
            acc.mark_cancelled();
        }

        let summary = acc.finish();
        event!(
            Level::INFO,
            unchanged = summary.unchanged(),
            patched = summary.patched(),
            failed = summary.failed(),
            aborted = summary.is_aborted(),
            cancelled = summary.is_cancelled(),
            "migration finished"
        );
        Ok(summary)
    }

    fn classify(&self, classifier: &dyn RecordClassifier, record: &Record) -> Step {
        match classifier.classify(record) {
            Ok(Classification::NoChange) => Step::Done(MigrationOutcome::unchanged(record.id.clone())),
            Ok(Classification::Patch(patch)) if self.options.dry_run => Step::Done(
                MigrationOutcome::patched(record.id.clone(), patch.clone(), describe(&patch, true)),
            ),
            Ok(Classification::Patch(patch)) => {
                Step::Write(PendingWrite::new(record.id.clone(), patch))
            }
            Err(err) => Step::Done(MigrationOutcome::failed(
                record.id.clone(),
                FailureReason::Unknown,
                err.to_string(),
            )),
        }
    }

    /// Commits queued writes and records every queued outcome in order.
    async fn flush(&self, pending: &mut Vec<Slot>, acc: &mut SummaryAccumulator) -> Flow {
        let slots = std::mem::take(pending);
        if slots.is_empty() {
            return Flow::Continue;
        }

        if self.store.supports_atomic_batches() {
            self.flush_atomic(slots, acc).await
        } else {
            self.flush_sequential(slots, acc).await
        }
    }

    async fn flush_atomic(&self, slots: Vec<Slot>, acc: &mut SummaryAccumulator) -> Flow {
        let writes: Vec<PendingWrite> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Write(write) => Some(write.clone()),
                Slot::Resolved(_) => None,
            })
            .collect();

        let result = if writes.is_empty() {
            Ok(())
        } else {
            self.store.merge_batch(&writes).await
        };

        if let Err(err) = &result {
            event!(
                Level::WARN,
                error = %err,
                writes = writes.len(),
                "batch commit failed"
            );
        }

        let abort = result.is_err() && !self.options.continue_on_error;
        // On abort nothing after the batch's last write is reported.
        let last_write = slots
            .iter()
            .rposition(|slot| matches!(slot, Slot::Write(_)));

        for (index, slot) in slots.into_iter().enumerate() {
            if abort && last_write.is_some_and(|last| index > last) {
                break;
            }
            let outcome = match slot {
                Slot::Resolved(outcome) => outcome,
                Slot::Write(write) => match &result {
                    Ok(()) => {
                        let detail = describe(&write.patch, false);
                        MigrationOutcome::patched(write.id, write.patch, detail)
                    }
                    Err(err) => MigrationOutcome::store_failure(write.id, err),
                },
            };
            record_outcome(acc, outcome);
        }

        if abort { Flow::Abort } else { Flow::Continue }
    }

    async fn flush_sequential(&self, slots: Vec<Slot>, acc: &mut SummaryAccumulator) -> Flow {
        for slot in slots {
            let outcome = match slot {
                Slot::Resolved(outcome) => outcome,
                Slot::Write(write) => match self.store.merge(&write.id, &write.patch).await {
                    Ok(()) => {
                        let detail = describe(&write.patch, false);
                        MigrationOutcome::patched(write.id, write.patch, detail)
                    }
                    Err(err) => {
                        record_outcome(acc, MigrationOutcome::store_failure(write.id, &err));
                        if !self.options.continue_on_error {
                            return Flow::Abort;
                        }
                        continue;
                    }
                },
            };
            record_outcome(acc, outcome);
        }
        Flow::Continue
    }
}

enum Step {
    Done(MigrationOutcome),
    Write(PendingWrite),
}

pub(crate) fn record_outcome(acc: &mut SummaryAccumulator, outcome: MigrationOutcome) {
    match outcome.failure_reason() {
        Some(reason) => event!(
            Level::WARN,
            record_id = %outcome.record_id,
            reason = %reason,
            detail = outcome.detail.as_deref().unwrap_or(""),
            "record failed"
        ),
        None => event!(
            Level::DEBUG,
            record_id = %outcome.record_id,
            status = %outcome.kind(),
            "record processed"
        ),
    }
    acc.record(outcome);
}

fn describe(patch: &Patch, dry_run: bool) -> String {
    let fields = patch.field_names().collect::<Vec<_>>().join(", ");
    if dry_run {
        format!("would set {fields}")
    } else {
        format!("set {fields}")
    }
}
