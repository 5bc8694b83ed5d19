//! JSON document database file
//!
//! The whole database lives in one JSON file:
//!
//! ```json
//! { "version": 1, "collections": { "routines": { "beginner_express": { ... } } } }
//! ```
//!
//! A `JsonFileStore` handle is bound to one collection. Every write reloads
//! the file, stages the change for its own collection, writes the full file
//! to a temporary sibling and renames it over the original. Other
//! collections are carried over as they are on disk, so handles bound to
//! different collections of one file do not overwrite each other.

use super::{Page, PendingWrite, RecordStore, paginate, validate_collection_name, validate_record_id};
use crate::core::{Fields, Patch, Record, RecordId, StoreError, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{Level, event};

pub const DATABASE_FILE_VERSION: u32 = 1;

type Collection = BTreeMap<RecordId, Fields>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub collections: BTreeMap<String, Collection>,
}

fn default_version() -> u32 {
    DATABASE_FILE_VERSION
}

impl Default for DatabaseFile {
    fn default() -> Self {
        Self {
            version: DATABASE_FILE_VERSION,
            collections: BTreeMap::new(),
        }
    }
}

pub struct JsonFileStore {
    path: PathBuf,
    collection: String,
    database: Mutex<DatabaseFile>,
}

impl JsonFileStore {
    /// Open the database file at `path`, bound to `collection`.
    ///
    /// A missing file is an empty database; it is created on the first commit.
    pub async fn open(path: impl AsRef<Path>, collection: impl Into<String>) -> StoreResult<Self> {
        let collection = collection.into();
        validate_collection_name(&collection)?;
        let path = path.as_ref().to_path_buf();

        let database = read_database(&path).await?;

        event!(
            Level::DEBUG,
            path = %path.display(),
            collection = %collection,
            "opened database file"
        );

        Ok(Self {
            path,
            collection,
            database: Mutex::new(database),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn collection_names(&self) -> Vec<String> {
        self.database.lock().await.collections.keys().cloned().collect()
    }

    /// Reloads `database` from disk and returns a copy of this handle's
    /// collection to stage a write on.
    async fn stage(&self, database: &mut DatabaseFile) -> StoreResult<Collection> {
        *database = read_database(&self.path).await?;
        Ok(database
            .collections
            .get(&self.collection)
            .cloned()
            .unwrap_or_default())
    }

    /// Replaces this handle's collection with `staged` and writes the file.
    /// On a failed write the in-memory state is rolled back.
    async fn commit(&self, database: &mut DatabaseFile, staged: Collection) -> StoreResult<()> {
        let previous = database.collections.insert(self.collection.clone(), staged);
        let written = match serde_json::to_vec_pretty(&*database) {
            Ok(bytes) => write_atomic(&self.path, bytes).await,
            Err(err) => Err(err.into()),
        };

        if let Err(err) = written {
            match previous {
                Some(previous) => {
                    database.collections.insert(self.collection.clone(), previous);
                }
                None => {
                    database.collections.remove(&self.collection);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    fn not_found(&self, id: &RecordId) -> StoreError {
        StoreError::not_found(format!(
            "Record '{}' not found in '{}'",
            id, self.collection
        ))
    }
}

async fn read_database(path: &Path) -> StoreResult<DatabaseFile> {
    match fs::read(path).await {
        Ok(bytes) => {
            let database: DatabaseFile = serde_json::from_slice(&bytes)?;
            if database.version > DATABASE_FILE_VERSION {
                return Err(StoreError::unknown(format!(
                    "Database file '{}' has version {}, newest supported is {}",
                    path.display(),
                    database.version,
                    DATABASE_FILE_VERSION
                )));
            }
            Ok(database)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(DatabaseFile::default()),
        Err(err) => Err(err.into()),
    }
}

async fn write_atomic(path: &Path, bytes: Vec<u8>) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[async_trait]
impl RecordStore for JsonFileStore {
    fn name(&self) -> &str {
        &self.collection
    }

    async fn list(&self, page_token: Option<&str>, page_size: usize) -> StoreResult<Page> {
        let database = self.database.lock().await;
        match database.collections.get(&self.collection) {
            Some(collection) => Ok(paginate(collection, page_token, page_size)),
            None => Ok(Page::default()),
        }
    }

    async fn get(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        let database = self.database.lock().await;
        Ok(database
            .collections
            .get(&self.collection)
            .and_then(|collection| collection.get(id))
            .map(|fields| Record::new(id.clone(), fields.clone())))
    }

    async fn merge(&self, id: &RecordId, patch: &Patch) -> StoreResult<()> {
        self.merge_batch(&[PendingWrite::new(id.clone(), patch.clone())])
            .await
    }

    async fn insert(&self, record: &Record) -> StoreResult<()> {
        validate_record_id(record.id.as_str())?;
        let mut database = self.database.lock().await;
        let mut staged = self.stage(&mut database).await?;
        if staged.contains_key(&record.id) {
            return Err(StoreError::conflict(format!(
                "Record '{}' already exists in '{}'",
                record.id, self.collection
            )));
        }
        staged.insert(record.id.clone(), record.fields.clone());
        self.commit(&mut database, staged).await
    }

    fn supports_atomic_batches(&self) -> bool {
        true
    }

    async fn merge_batch(&self, writes: &[PendingWrite]) -> StoreResult<()> {
        let mut database = self.database.lock().await;
        let mut staged = self.stage(&mut database).await?;

        for write in writes {
            let fields = staged
                .get_mut(&write.id)
                .ok_or_else(|| self.not_found(&write.id))?;
            write.patch.apply_to(fields);
        }
        self.commit(&mut database, staged).await
    }
}
