use super::{Page, PendingWrite, RecordStore, paginate, validate_record_id};
use crate::core::{Fields, Patch, Record, RecordId, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Failure scripted for merges against one record.
#[derive(Debug, Clone)]
struct InjectedFault {
    error: StoreError,
    /// `None` fails every merge; `Some(n)` fails the next `n` merges.
    remaining: Option<usize>,
}

/// Which `list` calls a scripted listing failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListFaultScope {
    Every,
    AfterFirstPage,
}

/// In-process record store ordered by id.
///
/// Batches are atomic: every write of a batch is validated before any is
/// applied. Faults can be scripted per record to exercise failure paths.
pub struct MemoryStore {
    name: String,
    records: RwLock<BTreeMap<RecordId, Fields>>,
    faults: Mutex<HashMap<RecordId, InjectedFault>>,
    list_fault: Mutex<Option<(ListFaultScope, StoreError)>>,
    list_calls: AtomicUsize,
    merge_calls: AtomicUsize,
    atomic_batches: bool,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(HashMap::new()),
            list_fault: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            merge_calls: AtomicUsize::new(0),
            atomic_batches: true,
        }
    }

    pub fn with_records(name: impl Into<String>, records: impl IntoIterator<Item = Record>) -> Self {
        let mut store = Self::new(name);
        let map = records
            .into_iter()
            .map(|record| (record.id, record.fields))
            .collect();
        store.records = RwLock::new(map);
        store
    }

    /// Disable all-or-nothing batches so the runner falls back to per-record merges.
    pub fn without_atomic_batches(mut self) -> Self {
        self.atomic_batches = false;
        self
    }

    /// Every merge against `id` fails with `error` until cleared.
    pub async fn fail_merges(&self, id: impl Into<RecordId>, error: StoreError) {
        self.faults.lock().await.insert(
            id.into(),
            InjectedFault {
                error,
                remaining: None,
            },
        );
    }

    /// The next `times` merges against `id` fail with `error`.
    pub async fn fail_next_merges(&self, id: impl Into<RecordId>, error: StoreError, times: usize) {
        self.faults.lock().await.insert(
            id.into(),
            InjectedFault {
                error,
                remaining: Some(times),
            },
        );
    }

    /// Every `list` call fails with `error`.
    pub async fn fail_listing(&self, error: StoreError) {
        *self.list_fault.lock().await = Some((ListFaultScope::Every, error));
    }

    /// The first page lists normally; any continuation fails with `error`.
    pub async fn fail_listing_after_first_page(&self, error: StoreError) {
        *self.list_fault.lock().await = Some((ListFaultScope::AfterFirstPage, error));
    }

    pub async fn clear_faults(&self) {
        self.faults.lock().await.clear();
        *self.list_fault.lock().await = None;
    }

    pub fn merge_calls(&self) -> usize {
        self.merge_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Copy of the full collection, for before/after comparisons.
    pub async fn snapshot(&self) -> BTreeMap<RecordId, Fields> {
        self.records.read().await.clone()
    }

    async fn take_fault(&self, id: &RecordId) -> Option<StoreError> {
        let mut faults = self.faults.lock().await;
        let fault = faults.get_mut(id)?;
        let error = fault.error.clone();
        match fault.remaining.as_mut() {
            None => {}
            Some(0) => {
                faults.remove(id);
                return None;
            }
            Some(remaining) => {
                *remaining -= 1;
                if *remaining == 0 {
                    faults.remove(id);
                }
            }
        }
        Some(error)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, page_token: Option<&str>, page_size: usize) -> StoreResult<Page> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((scope, error)) = self.list_fault.lock().await.as_ref() {
            let applies = match scope {
                ListFaultScope::Every => true,
                ListFaultScope::AfterFirstPage => page_token.is_some(),
            };
            if applies {
                return Err(error.clone());
            }
        }

        let records = self.records.read().await;
        Ok(paginate(&records, page_token, page_size))
    }

    async fn get(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        let records = self.records.read().await;
        Ok(records
            .get(id)
            .map(|fields| Record::new(id.clone(), fields.clone())))
    }

    async fn merge(&self, id: &RecordId, patch: &Patch) -> StoreResult<()> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_fault(id).await {
            return Err(error);
        }

        let mut records = self.records.write().await;
        let fields = records.get_mut(id).ok_or_else(|| {
            StoreError::not_found(format!("Record '{}' not found in '{}'", id, self.name))
        })?;
        patch.apply_to(fields);
        Ok(())
    }

    async fn insert(&self, record: &Record) -> StoreResult<()> {
        validate_record_id(record.id.as_str())?;
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::conflict(format!(
                "Record '{}' already exists in '{}'",
                record.id, self.name
            )));
        }
        records.insert(record.id.clone(), record.fields.clone());
        Ok(())
    }

    fn supports_atomic_batches(&self) -> bool {
        self.atomic_batches
    }

    async fn merge_batch(&self, writes: &[PendingWrite]) -> StoreResult<()> {
        if !self.atomic_batches {
            for write in writes {
                self.merge(&write.id, &write.patch).await?;
            }
            return Ok(());
        }

        self.merge_calls.fetch_add(writes.len(), Ordering::SeqCst);
        for write in writes {
            if let Some(error) = self.take_fault(&write.id).await {
                return Err(error);
            }
        }

        let mut records = self.records.write().await;
        if let Some(missing) = writes.iter().find(|write| !records.contains_key(&write.id)) {
            return Err(StoreError::not_found(format!(
                "Record '{}' not found in '{}'",
                missing.id, self.name
            )));
        }
        for write in writes {
            if let Some(fields) = records.get_mut(&write.id) {
                write.patch.apply_to(fields);
            }
        }
        Ok(())
    }
}
