use docmigrate::{
    CancelFlag, Classification, ClassifierError, CollectionSource, FailureReason, FileSource,
    MemoryStore, MigrationError, MigrationOptions, MigrationRunner, OutcomeKind, Record,
    RecordClassifier, RecordId, RecordStore, RestDayMethodsClassifier, RetryPolicy,
    RetryingStore, StoreError, TextReporter, ResultReporter, exit_status,
};
use serde_json::json;
use std::sync::Arc;

fn record(id: &str, value: serde_json::Value) -> Record {
    Record::from_json(id, value).unwrap()
}

fn schedule() -> Vec<Record> {
    vec![
        record("day1", json!({"dayNumber": 1, "isRestDay": false, "methods": ["am1_0"]})),
        record("day2", json!({"dayNumber": 2, "isRestDay": true})),
        record("day3", json!({"dayNumber": 3, "isRestDay": true, "methods": []})),
        record("day4", json!({"dayNumber": 4, "isRestDay": true})),
        record("day5", json!({"dayNumber": 5, "isRestDay": false})),
    ]
}

fn runner(store: &Arc<MemoryStore>, options: MigrationOptions) -> MigrationRunner {
    MigrationRunner::new(store.clone(), options).unwrap()
}

/// Three records in source order: fails to write, needs a patch, already correct.
fn conflict_scenario() -> (Arc<MemoryStore>, Vec<Record>) {
    let records = vec![
        record("a_conflict", json!({"isRestDay": true})),
        record("b_needs_patch", json!({"isRestDay": true})),
        record("c_correct", json!({"isRestDay": true, "methods": []})),
    ];
    (Arc::new(MemoryStore::with_records("routines", records.clone())), records)
}

#[tokio::test]
async fn test_no_change_records_are_untouched() {
    let store = Arc::new(MemoryStore::with_records("routines", schedule()));
    let before = store.snapshot().await;

    let mut source = CollectionSource::new(store.clone()).page_size(2);
    let summary = runner(&store, MigrationOptions::default())
        .run(&mut source, &RestDayMethodsClassifier::new())
        .await
        .unwrap();

    let after = store.snapshot().await;
    for outcome in summary.outcomes() {
        if outcome.kind() == OutcomeKind::Unchanged {
            assert_eq!(before[&outcome.record_id], after[&outcome.record_id]);
        }
    }
    assert_eq!(summary.patched(), 2);
    assert_eq!(summary.unchanged(), 3);
    assert_eq!(after[&RecordId::new("day2")]["methods"], json!([]));
}

#[tokio::test]
async fn test_second_run_converges() {
    let store = Arc::new(MemoryStore::with_records("routines", schedule()));
    let runner = runner(&store, MigrationOptions::default().batch_size(3));
    let classifier = RestDayMethodsClassifier::new();
    let mut source = CollectionSource::new(store.clone()).page_size(2);

    let first = runner.run(&mut source, &classifier).await.unwrap();
    assert_eq!(first.patched(), 2);

    // the same source is rewound by the runner
    let second = runner.run(&mut source, &classifier).await.unwrap();
    assert_eq!(second.patched(), 0);
    assert_eq!(second.unchanged(), 5);
    assert_ne!(first.run_id(), second.run_id());
}

#[tokio::test]
async fn test_dry_run_matches_live_counts_without_writing() {
    let store = Arc::new(MemoryStore::with_records("routines", schedule()));
    let classifier = RestDayMethodsClassifier::new();

    let mut source = CollectionSource::new(store.clone());
    let dry = runner(&store, MigrationOptions::default().dry_run(true))
        .run(&mut source, &classifier)
        .await
        .unwrap();
    assert_eq!(store.merge_calls(), 0);

    let live = runner(&store, MigrationOptions::default())
        .run(&mut source, &classifier)
        .await
        .unwrap();

    for kind in [OutcomeKind::Unchanged, OutcomeKind::Patched, OutcomeKind::Failed] {
        assert_eq!(dry.count(kind), live.count(kind));
    }
    assert!(store.merge_calls() > 0);
}

#[tokio::test]
async fn test_conflict_is_reported_and_run_continues() {
    let (store, records) = conflict_scenario();
    store
        .fail_merges("a_conflict", StoreError::conflict("document changed concurrently"))
        .await;

    let mut source = FileSource::from_records("scenario.json", records);
    let summary = runner(&store, MigrationOptions::default())
        .run(&mut source, &RestDayMethodsClassifier::new())
        .await
        .unwrap();

    assert_eq!(summary.unchanged(), 1);
    assert_eq!(summary.patched(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.is_aborted());
    assert_eq!(exit_status(&summary), 1);

    let failure = summary.failures().next().unwrap();
    assert_eq!(failure.record_id, RecordId::new("a_conflict"));
    assert_eq!(failure.failure_reason(), Some(FailureReason::Conflict));

    let text = TextReporter::new().render(&summary);
    assert!(text.contains("a_conflict conflict: document changed concurrently"));
}

#[tokio::test]
async fn test_abort_stops_at_first_failure() {
    let (store, records) = conflict_scenario();
    store
        .fail_merges("a_conflict", StoreError::conflict("document changed concurrently"))
        .await;

    let mut source = FileSource::from_records("scenario.json", records);
    let summary = runner(&store, MigrationOptions::default().continue_on_error(false))
        .run(&mut source, &RestDayMethodsClassifier::new())
        .await
        .unwrap();

    assert!(summary.is_aborted());
    assert_eq!(summary.total(), 1);
    assert_eq!(summary.outcomes()[0].record_id, RecordId::new("a_conflict"));
    assert_eq!(exit_status(&summary), 1);

    // nothing after the failure was written
    let stored = store.get(&RecordId::new("b_needs_patch")).await.unwrap().unwrap();
    assert!(!stored.has_field("methods"));
}

#[tokio::test]
async fn test_atomic_batch_failure_fails_every_member() {
    let records: Vec<Record> = (1..=4)
        .map(|n| record(&format!("day{n}"), json!({"isRestDay": true})))
        .collect();
    let store = Arc::new(MemoryStore::with_records("routines", records.clone()));
    store
        .fail_merges("day2", StoreError::permission_denied("collection is read-only"))
        .await;

    let mut source = FileSource::from_records("days.json", records);
    let summary = runner(&store, MigrationOptions::default().batch_size(2))
        .run(&mut source, &RestDayMethodsClassifier::new())
        .await
        .unwrap();

    assert_eq!(summary.failed(), 2);
    assert_eq!(summary.patched(), 2);
    for id in ["day1", "day2"] {
        let outcome = summary.outcome_for(&RecordId::new(id)).unwrap();
        assert_eq!(outcome.failure_reason(), Some(FailureReason::PermissionDenied));
    }

    // the failed batch left day1 untouched even though its own merge was fine
    let day1 = store.get(&RecordId::new("day1")).await.unwrap().unwrap();
    assert!(!day1.has_field("methods"));
    let day3 = store.get(&RecordId::new("day3")).await.unwrap().unwrap();
    assert_eq!(day3.get("methods"), Some(&json!([])));
}

#[tokio::test]
async fn test_classifier_failures_are_unknown_and_isolated() {
    let store = Arc::new(MemoryStore::with_records(
        "routines",
        vec![
            record("day1", json!({"isRestDay": "yes"})),
            record("day2", json!({"isRestDay": true})),
        ],
    ));
    let mut source = CollectionSource::new(store.clone());
    let summary = runner(&store, MigrationOptions::default().continue_on_error(false))
        .run(&mut source, &RestDayMethodsClassifier::new())
        .await
        .unwrap();

    assert!(!summary.is_aborted());
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.patched(), 1);
    let failed = summary.outcome_for(&RecordId::new("day1")).unwrap();
    assert_eq!(failed.failure_reason(), Some(FailureReason::Unknown));
}

/// Requests cancellation while classifying one specific record.
struct CancelAt {
    id: &'static str,
    flag: CancelFlag,
    inner: RestDayMethodsClassifier,
}

impl RecordClassifier for CancelAt {
    fn name(&self) -> &str {
        "cancel-at"
    }

    fn classify(&self, record: &Record) -> Result<Classification, ClassifierError> {
        if record.id.as_str() == self.id {
            self.flag.cancel();
        }
        self.inner.classify(record)
    }
}

#[tokio::test]
async fn test_cancellation_keeps_committed_work() {
    let store = Arc::new(MemoryStore::with_records("routines", schedule()));
    let flag = CancelFlag::new();
    let runner = runner(&store, MigrationOptions::default().batch_size(10));
    let classifier = CancelAt {
        id: "day2",
        flag: flag.clone(),
        inner: RestDayMethodsClassifier::new(),
    };

    let mut source = CollectionSource::new(store.clone());
    let summary = runner
        .run_with_cancel(&mut source, &classifier, &flag)
        .await
        .unwrap();

    assert!(summary.is_cancelled());
    assert_eq!(summary.total(), 2);
    assert_eq!(exit_status(&summary), 1);
    // day2 was classified before the stop and its pending write was flushed
    let day2 = store.get(&RecordId::new("day2")).await.unwrap().unwrap();
    assert_eq!(day2.get("methods"), Some(&json!([])));
    let day4 = store.get(&RecordId::new("day4")).await.unwrap().unwrap();
    assert!(!day4.has_field("methods"));
}

#[tokio::test]
async fn test_runner_is_reusable_after_cancelled_run() {
    let store = Arc::new(MemoryStore::with_records("routines", schedule()));
    let runner = runner(&store, MigrationOptions::default());
    let classifier = RestDayMethodsClassifier::new();
    let mut source = CollectionSource::new(store.clone());

    let flag = CancelFlag::new();
    flag.cancel();
    let cancelled = runner
        .run_with_cancel(&mut source, &classifier, &flag)
        .await
        .unwrap();
    assert!(cancelled.is_cancelled());
    assert_eq!(cancelled.total(), 0);

    let next = runner.run(&mut source, &classifier).await.unwrap();
    assert!(!next.is_cancelled());
    assert_eq!(next.total(), 5);
    assert_eq!(next.patched(), 2);
    assert!(next.is_success());
}

#[tokio::test]
async fn test_cancel_after_last_record_is_a_complete_run() {
    let store = Arc::new(MemoryStore::with_records("routines", schedule()));
    let flag = CancelFlag::new();
    let classifier = CancelAt {
        id: "day5",
        flag: flag.clone(),
        inner: RestDayMethodsClassifier::new(),
    };

    let mut source = CollectionSource::new(store.clone()).page_size(5);
    let summary = runner(&store, MigrationOptions::default().batch_size(10))
        .run_with_cancel(&mut source, &classifier, &flag)
        .await
        .unwrap();

    assert!(flag.is_cancelled());
    assert!(!summary.is_cancelled());
    assert_eq!(summary.total(), 5);
    assert_eq!(exit_status(&summary), 0);
}

#[tokio::test]
async fn test_unavailable_source_processes_nothing() {
    let store = Arc::new(MemoryStore::with_records("routines", schedule()));
    store.fail_listing(StoreError::permission_denied("no list access")).await;

    let mut source = CollectionSource::new(store.clone());
    let result = runner(&store, MigrationOptions::default())
        .run(&mut source, &RestDayMethodsClassifier::new())
        .await;

    assert!(matches!(result, Err(MigrationError::SourceUnavailable(_))));
    assert_eq!(store.merge_calls(), 0);
}

#[tokio::test]
async fn test_interrupted_source_returns_partial_summary() {
    let store = Arc::new(MemoryStore::with_records("routines", schedule()));
    store
        .fail_listing_after_first_page(StoreError::transient("connection reset"))
        .await;

    let mut source = CollectionSource::new(store.clone()).page_size(2);
    let err = runner(&store, MigrationOptions::default())
        .run(&mut source, &RestDayMethodsClassifier::new())
        .await
        .unwrap_err();

    let summary = err.partial_summary().unwrap();
    assert!(summary.is_aborted());
    assert_eq!(summary.total(), 2);
    assert_eq!(summary.patched(), 1);
    let day2 = store.get(&RecordId::new("day2")).await.unwrap().unwrap();
    assert_eq!(day2.get("methods"), Some(&json!([])));
}

#[tokio::test]
async fn test_retrying_store_absorbs_transient_failures() {
    let memory = Arc::new(MemoryStore::with_records("routines", schedule()));
    memory
        .fail_next_merges("day2", StoreError::transient("deadline exceeded"), 2)
        .await;
    let store: Arc<dyn RecordStore> =
        Arc::new(RetryingStore::new(memory.clone(), RetryPolicy::default()));

    let mut source = CollectionSource::new(store.clone());
    let summary = MigrationRunner::new(store, MigrationOptions::default())
        .unwrap()
        .run(&mut source, &RestDayMethodsClassifier::new())
        .await
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.patched(), 2);
}
