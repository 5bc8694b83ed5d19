pub mod error;
pub mod record;

pub use error::{
    ClassifierError, SourceError, SourceResult, StoreError, StoreErrorKind, StoreResult,
};
pub use record::{Fields, Patch, Record, RecordId, json_type_name};
