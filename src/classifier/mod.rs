//! Record classifiers
//!
//! A classifier is a pure function from a record's current field values to a
//! decision: leave it alone, or apply a patch. Classifiers never look at the
//! clock or at run-wide state, which is what makes re-running a migration
//! converge.
//!
//! # Architecture
//!
//! - `rest_day.rs` - Back-fills `methods` on rest-day schedule entries
//! - `defaults.rs` - Fills missing fields with configured defaults
//! - `lookup.rs` - Derives a field from a lookup table keyed by another field
//! - `chain.rs` - Runs several classifiers as one
//! - `registry.rs` - Named classifiers for the command line

mod chain;
mod defaults;
mod lookup;
mod registry;
mod rest_day;

pub use chain::ChainClassifier;
pub use defaults::DefaultFieldsClassifier;
pub use lookup::LookupClassifier;
pub use registry::ClassifierRegistry;
pub use rest_day::RestDayMethodsClassifier;

use crate::core::{ClassifierError, Patch, Record};

/// Decision for one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    NoChange,
    Patch(Patch),
}

impl Classification {
    /// Wraps a patch, collapsing an empty one to `NoChange`.
    pub fn from_patch(patch: Patch) -> Self {
        if patch.is_empty() {
            Self::NoChange
        } else {
            Self::Patch(patch)
        }
    }

    pub fn is_no_change(&self) -> bool {
        matches!(self, Self::NoChange)
    }

    pub fn patch(&self) -> Option<&Patch> {
        match self {
            Self::NoChange => None,
            Self::Patch(patch) => Some(patch),
        }
    }
}

pub trait RecordClassifier: Send + Sync {
    /// Stable name used in logs and reports.
    fn name(&self) -> &str;

    fn classify(&self, record: &Record) -> Result<Classification, ClassifierError>;
}

impl<T: RecordClassifier + ?Sized> RecordClassifier for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn classify(&self, record: &Record) -> Result<Classification, ClassifierError> {
        (**self).classify(record)
    }
}
