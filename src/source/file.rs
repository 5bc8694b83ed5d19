use super::RecordSource;
use crate::core::{Record, RecordId, SourceError, SourceResult};
use crate::storage::validate_record_id;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Records loaded once from a local JSON fixture.
///
/// Accepted shapes:
/// - an array of objects, each with a string `id` (removed from the fields)
/// - an object mapping id to fields, yielded in id order
pub struct FileSource {
    path: PathBuf,
    records: Vec<Record>,
    chunk_size: usize,
    position: usize,
}

impl FileSource {
    /// Read and parse the whole fixture. Any read or shape error is
    /// `SourceUnavailable`; no partial fixture is ever returned.
    pub async fn load(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let origin = format!("file:{}", path.display());

        let text = fs::read_to_string(&path)
            .await
            .map_err(|err| SourceError::unavailable(&origin, err))?;
        let records =
            parse_fixture(&text).map_err(|reason| SourceError::unavailable(&origin, reason))?;

        Ok(Self {
            path,
            records,
            chunk_size: super::DEFAULT_PAGE_SIZE,
            position: 0,
        })
    }

    pub fn from_records(path: impl Into<PathBuf>, records: Vec<Record>) -> Self {
        Self {
            path: path.into(),
            records,
            chunk_size: super::DEFAULT_PAGE_SIZE,
            position: 0,
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

#[async_trait]
impl RecordSource for FileSource {
    fn origin(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn next_page(&mut self) -> SourceResult<Option<Vec<Record>>> {
        if self.position >= self.records.len() {
            return Ok(None);
        }
        let end = (self.position + self.chunk_size).min(self.records.len());
        let page = self.records[self.position..end].to_vec();
        self.position = end;
        Ok(Some(page))
    }

    fn rewind(&mut self) {
        self.position = 0;
    }
}

/// Parses fixture text into records.
///
/// The array form keeps file order; the keyed-object form is ordered by id.
pub(crate) fn parse_fixture(text: &str) -> Result<Vec<Record>, String> {
    let value: JsonValue =
        serde_json::from_str(text).map_err(|err| format!("JSON parse error: {}", err))?;

    let entries: Vec<(String, JsonValue)> = match value {
        JsonValue::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| split_id(index, item))
            .collect::<Result<_, _>>()?,
        JsonValue::Object(map) => {
            let mut entries: Vec<(String, JsonValue)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries
        }
        _ => {
            return Err("Expected a JSON array of objects or an object keyed by id".to_string());
        }
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());
    for (id, fields) in entries {
        validate_record_id(&id).map_err(|err| err.message)?;
        if !seen.insert(id.clone()) {
            return Err(format!("Duplicate record id '{}'", id));
        }
        let record = Record::from_json(RecordId::new(id.clone()), fields)
            .map_err(|err| format!("Record '{}': {}", id, err))?;
        records.push(record);
    }
    Ok(records)
}

fn split_id(index: usize, item: JsonValue) -> Result<(String, JsonValue), String> {
    let JsonValue::Object(mut map) = item else {
        return Err(format!("Element {} is not a JSON object", index));
    };
    match map.remove("id") {
        Some(JsonValue::String(id)) => Ok((id, JsonValue::Object(map))),
        Some(_) => Err(format!("Element {} has a non-string 'id'", index)),
        None => Err(format!("Element {} is missing 'id'", index)),
    }
}
