use super::{MigrationError, MigrationResult};
use crate::source::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};

/// Migration run configuration
///
/// # Examples
///
/// ```
/// use docmigrate::MigrationOptions;
///
/// let options = MigrationOptions::default()
///     .dry_run(true)
///     .batch_size(20)
///     .continue_on_error(false);
///
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Compute outcomes but never write
    pub dry_run: bool,

    /// Number of merges grouped per commit
    pub batch_size: usize,

    /// Keep going after a record's write fails
    pub continue_on_error: bool,

    /// Records fetched per source page
    pub page_size: usize,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: 1,
            continue_on_error: true,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MigrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set dry-run mode
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the number of writes per commit
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set whether a failed write stops the run
    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Set the source page size
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> MigrationResult<()> {
        if self.batch_size == 0 {
            return Err(MigrationError::InvalidOptions(
                "batch_size must be >= 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(MigrationError::InvalidOptions(
                "page_size must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
