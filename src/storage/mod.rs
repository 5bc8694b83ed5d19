//! Record store collaborators
//!
//! A store models one collection of a managed document database. The runner
//! only ever lists, reads and merges; it never deletes and never writes a
//! field the patch does not name.
//!
//! # Architecture
//!
//! - `memory.rs` - In-process store with fault injection (tests, fixtures)
//! - `file.rs` - JSON document database file, one collection per handle
//! - `retry.rs` - Decorator retrying transient failures with backoff
//! - `validator.rs` - Collection name and record id rules

pub mod file;
pub mod memory;
pub mod retry;
pub mod validator;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryingStore};
pub use validator::{validate_collection_name, validate_record_id};

use crate::core::{Fields, Patch, Record, RecordId, StoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// One page of a collection listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub records: Vec<Record>,
    /// Token to pass to the next `list` call; `None` once the collection is exhausted.
    pub next_page_token: Option<String>,
}

/// A merge waiting to be committed as part of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub id: RecordId,
    pub patch: Patch,
}

impl PendingWrite {
    pub fn new(id: RecordId, patch: Patch) -> Self {
        Self { id, patch }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Collection label used in logs and reports.
    fn name(&self) -> &str;

    /// Lists records in a stable order, at most `page_size` at a time.
    async fn list(&self, page_token: Option<&str>, page_size: usize) -> StoreResult<Page>;

    async fn get(&self, id: &RecordId) -> StoreResult<Option<Record>>;

    /// Update-if-exists: sets exactly the patch's fields, leaves every other
    /// field untouched, and fails with `notFound` when the record is absent.
    async fn merge(&self, id: &RecordId, patch: &Patch) -> StoreResult<()>;

    /// Create-only write; fails with `conflict` when the id already exists.
    async fn insert(&self, record: &Record) -> StoreResult<()>;

    /// Whether `merge_batch` commits all-or-nothing.
    fn supports_atomic_batches(&self) -> bool {
        false
    }

    /// Commits a group of merges. The default applies them one by one and
    /// stops at the first failure, leaving earlier merges committed.
    async fn merge_batch(&self, writes: &[PendingWrite]) -> StoreResult<()> {
        for write in writes {
            self.merge(&write.id, &write.patch).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn list(&self, page_token: Option<&str>, page_size: usize) -> StoreResult<Page> {
        (**self).list(page_token, page_size).await
    }

    async fn get(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        (**self).get(id).await
    }

    async fn merge(&self, id: &RecordId, patch: &Patch) -> StoreResult<()> {
        (**self).merge(id, patch).await
    }

    async fn insert(&self, record: &Record) -> StoreResult<()> {
        (**self).insert(record).await
    }

    fn supports_atomic_batches(&self) -> bool {
        (**self).supports_atomic_batches()
    }

    async fn merge_batch(&self, writes: &[PendingWrite]) -> StoreResult<()> {
        (**self).merge_batch(writes).await
    }
}

/// Pages over an id-ordered map. The token is the last id of the previous page.
pub(crate) fn paginate(
    records: &BTreeMap<RecordId, Fields>,
    page_token: Option<&str>,
    page_size: usize,
) -> Page {
    let start = match page_token {
        Some(token) => Bound::Excluded(RecordId::new(token)),
        None => Bound::Unbounded,
    };
    let mut remaining = records.range((start, Bound::Unbounded));
    let page: Vec<Record> = remaining
        .by_ref()
        .take(page_size.max(1))
        .map(|(id, fields)| Record::new(id.clone(), fields.clone()))
        .collect();
    let next_page_token = if remaining.next().is_some() {
        page.last().map(|record| record.id.to_string())
    } else {
        None
    };

    Page {
        records: page,
        next_page_token,
    }
}
