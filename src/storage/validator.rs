//! Naming rules for collections and record ids

use crate::core::{StoreError, StoreResult};

const MAX_COLLECTION_NAME_LEN: usize = 64;
const MAX_RECORD_ID_LEN: usize = 1500;

/// Validate a collection name
///
/// Names must start with a letter or underscore and contain only letters,
/// digits and underscores.
pub fn validate_collection_name(name: &str) -> StoreResult<()> {
    let Some(first) = name.chars().next() else {
        return Err(StoreError::unknown("Collection name cannot be empty"));
    };

    if !first.is_alphabetic() && first != '_' {
        return Err(StoreError::unknown(
            "Collection name must start with a letter or underscore",
        ));
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(StoreError::unknown(
            "Collection name can only contain letters, numbers, and underscores",
        ));
    }

    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(StoreError::unknown(format!(
            "Collection name too long (max {} characters)",
            MAX_COLLECTION_NAME_LEN
        )));
    }

    Ok(())
}

/// Validate a record id
///
/// Mirrors the document id rules of the managed store: non-empty, no `/`,
/// not `.` or `..`, bounded length.
pub fn validate_record_id(id: &str) -> StoreResult<()> {
    if id.trim().is_empty() {
        return Err(StoreError::unknown("Record id cannot be empty"));
    }
    if id.contains('/') {
        return Err(StoreError::unknown(format!(
            "Record id '{}' cannot contain '/'",
            id
        )));
    }
    if id == "." || id == ".." {
        return Err(StoreError::unknown(format!("Record id '{}' is reserved", id)));
    }
    if id.len() > MAX_RECORD_ID_LEN {
        return Err(StoreError::unknown(format!(
            "Record id too long (max {} bytes)",
            MAX_RECORD_ID_LEN
        )));
    }
    Ok(())
}
