//! Record sources
//!
//! A source yields the universe of candidate records for one run, page by
//! page, in a stable order. Sources are restartable: `rewind` puts the cursor
//! back at the first record, so the same source can drive several passes.

mod collection;
mod file;

pub use collection::{CollectionSource, DEFAULT_PAGE_SIZE};
pub use file::FileSource;

use crate::core::{Record, SourceResult};
use async_trait::async_trait;

#[async_trait]
pub trait RecordSource: Send {
    /// Human readable origin (collection name or file path).
    fn origin(&self) -> String;

    /// Next page of records, or `None` once the source is exhausted.
    async fn next_page(&mut self) -> SourceResult<Option<Vec<Record>>>;

    /// Restart from the first record.
    fn rewind(&mut self);
}

/// Drains a source from its first record into memory.
pub async fn collect_all(source: &mut dyn RecordSource) -> SourceResult<Vec<Record>> {
    source.rewind();
    let mut records = Vec::new();
    while let Some(page) = source.next_page().await? {
        records.extend(page);
    }
    Ok(records)
}
