// ============================================================================
// docmigrate Library
// ============================================================================

pub mod classifier;
pub mod config;
pub mod core;
pub mod report;
pub mod runner;
pub mod source;
pub mod storage;

// Re-export main types for convenience
pub use core::{
    ClassifierError, Fields, Patch, Record, RecordId, SourceError, SourceResult, StoreError,
    StoreErrorKind, StoreResult,
};

pub use classifier::{
    ChainClassifier, Classification, ClassifierRegistry, DefaultFieldsClassifier,
    LookupClassifier, RecordClassifier, RestDayMethodsClassifier,
};
pub use report::{JsonReporter, ReportFormat, ResultReporter, TextReporter, exit_status};
pub use runner::{
    CancelFlag, FailureReason, MigrationError, MigrationOptions, MigrationOutcome,
    MigrationResult, MigrationRunner, MigrationSummary, OutcomeKind, OutcomeStatus,
};
pub use source::{CollectionSource, FileSource, RecordSource, collect_all};
pub use storage::{
    JsonFileStore, MemoryStore, Page, PendingWrite, RecordStore, RetryPolicy, RetryingStore,
};

// ============================================================================
// Convenience entry point
// ============================================================================

/// Runs `classifier` over a whole store collection.
///
/// Shorthand for paging through `store` with a [`CollectionSource`] and
/// applying the patches back to the same store.
///
/// # Examples
///
/// ```
/// use docmigrate::{MemoryStore, MigrationOptions, Record, RestDayMethodsClassifier};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let day = Record::from_json("day7", json!({"isRestDay": true}))?;
/// let store = Arc::new(MemoryStore::with_records("routines", vec![day]));
///
/// let summary = docmigrate::migrate_collection(
///     store,
///     &RestDayMethodsClassifier::new(),
///     MigrationOptions::default(),
/// )
/// .await?;
/// assert_eq!(summary.patched(), 1);
/// # Ok(())
/// # }
/// ```
pub async fn migrate_collection(
    store: std::sync::Arc<dyn RecordStore>,
    classifier: &dyn RecordClassifier,
    options: MigrationOptions,
) -> MigrationResult<MigrationSummary> {
    let mut source = CollectionSource::new(store.clone()).page_size(options.page_size);
    let runner = MigrationRunner::new(store, options)?;
    runner.run(&mut source, classifier).await
}
