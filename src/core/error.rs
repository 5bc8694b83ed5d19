use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed store call.
///
/// Every backend error is folded into one of these kinds before it reaches
/// the runner, so outcome reporting is uniform across stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreErrorKind {
    NotFound,
    PermissionDenied,
    Conflict,
    Transient,
    Unknown,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "notFound",
            Self::PermissionDenied => "permissionDenied",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::PermissionDenied, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Conflict, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Transient, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unknown, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind == StoreErrorKind::Transient
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let kind = match err.kind() {
            ErrorKind::NotFound => StoreErrorKind::NotFound,
            ErrorKind::PermissionDenied => StoreErrorKind::PermissionDenied,
            ErrorKind::AlreadyExists => StoreErrorKind::Conflict,
            ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                StoreErrorKind::Transient
            }
            _ => StoreErrorKind::Unknown,
        };
        Self::new(kind, format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::unknown(format!("JSON error: {}", err))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Raised when the record universe for a run cannot be established.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Source '{origin}' unavailable: {reason}")]
    Unavailable { origin: String, reason: String },
}

impl SourceError {
    pub fn unavailable(origin: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Unavailable {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Raised by a classifier that cannot decide on a record.
///
/// The runner records these as `failed(unknown)` for the offending record
/// and keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Field '{field}' has unexpected type: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Field '{field}' has unrecognized value {value}")]
    UnrecognizedValue { field: String, value: String },

    #[error("Invalid record: {0}")]
    Invalid(String),
}
