use super::RecordSource;
use crate::core::{Record, SourceError, SourceResult};
use crate::storage::RecordStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Level, event};

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    At(String),
    Exhausted,
}

/// Pages lazily through a store collection.
pub struct CollectionSource {
    store: Arc<dyn RecordStore>,
    page_size: usize,
    cursor: Cursor,
}

impl CollectionSource {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
            cursor: Cursor::Start,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl RecordSource for CollectionSource {
    fn origin(&self) -> String {
        format!("collection:{}", self.store.name())
    }

    async fn next_page(&mut self) -> SourceResult<Option<Vec<Record>>> {
        let token = match &self.cursor {
            Cursor::Exhausted => return Ok(None),
            Cursor::Start => None,
            Cursor::At(token) => Some(token.clone()),
        };

        let page = self
            .store
            .list(token.as_deref(), self.page_size)
            .await
            .map_err(|err| SourceError::unavailable(self.origin(), err))?;

        event!(
            Level::DEBUG,
            collection = %self.store.name(),
            records = page.records.len(),
            has_more = page.next_page_token.is_some(),
            "fetched page"
        );

        self.cursor = match page.next_page_token {
            Some(next) => Cursor::At(next),
            None => Cursor::Exhausted,
        };

        if page.records.is_empty() && self.cursor == Cursor::Exhausted {
            return Ok(None);
        }
        Ok(Some(page.records))
    }

    fn rewind(&mut self) {
        self.cursor = Cursor::Start;
    }
}
