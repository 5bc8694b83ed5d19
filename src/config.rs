use crate::storage::RetryPolicy;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const STORE_VAR: &str = "DOCMIGRATE_STORE";
pub const COLLECTION_VAR: &str = "DOCMIGRATE_COLLECTION";
pub const RETRY_ATTEMPTS_VAR: &str = "DOCMIGRATE_RETRY_ATTEMPTS";

/// Environment defaults for the command line tool.
///
/// Command line flags take precedence over every value here.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub store_path: Option<PathBuf>,
    pub collection: Option<String>,
    pub retry: RetryPolicy,
}

impl AppConfig {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store_path = lookup(STORE_VAR)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let collection = lookup(COLLECTION_VAR).filter(|value| !value.trim().is_empty());

        let mut retry = RetryPolicy::default();
        if let Some(raw) = lookup(RETRY_ATTEMPTS_VAR) {
            retry.max_attempts = raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("{RETRY_ATTEMPTS_VAR} must be a valid u32"))?
                .max(1);
        }

        Ok(Self {
            store_path,
            collection,
            retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_reads_values() {
        let config = AppConfig::from_lookup(lookup(&[
            (STORE_VAR, "data/app.json"),
            (COLLECTION_VAR, "routines"),
            (RETRY_ATTEMPTS_VAR, "5"),
        ]))
        .unwrap();
        assert_eq!(config.store_path, Some(PathBuf::from("data/app.json")));
        assert_eq!(config.collection.as_deref(), Some("routines"));
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_missing_and_blank_values_fall_back() {
        let config = AppConfig::from_lookup(lookup(&[(COLLECTION_VAR, "  ")])).unwrap();
        assert!(config.store_path.is_none());
        assert!(config.collection.is_none());
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_bad_retry_attempts() {
        assert!(AppConfig::from_lookup(lookup(&[(RETRY_ATTEMPTS_VAR, "many")])).is_err());
    }
}
