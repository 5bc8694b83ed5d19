use super::{Page, PendingWrite, RecordStore};
use crate::core::{Patch, Record, RecordId, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{Level, event};

/// Configuration for retry behavior on transient failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Initial backoff duration in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 5,
            max_backoff_ms: 250,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Exponential backoff before retry number `attempt` (1 based).
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let base = self.initial_backoff_ms.max(1);
        let max = self.max_backoff_ms.max(base);
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        base.saturating_mul(factor).min(max)
    }
}

/// Store decorator that retries `transient` failures.
///
/// Every other error kind is returned on the first occurrence. The runner
/// itself never retries; wrap the store in this decorator to opt in.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: RecordStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = StoreResult<T>> + Send,
        T: Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let backoff = self.policy.backoff_ms(attempt);
                    event!(
                        Level::WARN,
                        store = %self.inner.name(),
                        operation,
                        attempt,
                        backoff_ms = backoff,
                        error = %err,
                        "transient store failure, retrying"
                    );
                    sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for RetryingStore<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list(&self, page_token: Option<&str>, page_size: usize) -> StoreResult<Page> {
        self.with_retry("list", || self.inner.list(page_token, page_size))
            .await
    }

    async fn get(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        self.with_retry("get", || self.inner.get(id)).await
    }

    async fn merge(&self, id: &RecordId, patch: &Patch) -> StoreResult<()> {
        self.with_retry("merge", || self.inner.merge(id, patch))
            .await
    }

    async fn insert(&self, record: &Record) -> StoreResult<()> {
        self.with_retry("insert", || self.inner.insert(record))
            .await
    }

    fn supports_atomic_batches(&self) -> bool {
        self.inner.supports_atomic_batches()
    }

    async fn merge_batch(&self, writes: &[PendingWrite]) -> StoreResult<()> {
        self.with_retry("merge_batch", || self.inner.merge_batch(writes))
            .await
    }
}
