//! Read-through cache with write-driven invalidation
//!
//! The cache is never allowed to fail the caller: every store operation is
//! bounded by `op_timeout`, and a failed or slow store degrades reads to a
//! direct compute and invalidations to a no-op that reports zero deletions.

use crate::config::CacheConfig;
use crate::metrics::CacheMetrics;
use crate::store::{CacheStore, RedisStore};
use crate::{CacheError, CacheResult};
use resilience::{with_timeout, TimeoutError};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CacheCoordinator {
    store: Arc<dyn CacheStore>,
    op_timeout: Duration,
    /// Bumped on every invalidation; fills computed across a bump are not stored
    epoch: Arc<AtomicU64>,
    metrics: CacheMetrics,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            op_timeout: crate::config::DEFAULT_OP_TIMEOUT,
            epoch: Arc::new(AtomicU64::new(0)),
            metrics: CacheMetrics::new(),
        }
    }

    /// Coordinator over Redis at `config.redis_url`
    pub async fn connect(config: &CacheConfig) -> CacheResult<Self> {
        let store = RedisStore::connect(&config.redis_url).await?;
        Ok(Self::new(Arc::new(store)).with_op_timeout(config.op_timeout))
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// Errors from `compute` are returned as-is and nothing is cached.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.read(key).await {
            return Ok(value);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let value = compute().await?;
        self.fill(key, &value, ttl, epoch).await;
        Ok(value)
    }

    /// Like [`get_or_compute`](Self::get_or_compute) for lookups that may find
    /// nothing. Absence is never cached.
    pub async fn get_or_compute_optional<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(value) = self.read(key).await {
            return Ok(Some(value));
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let value = compute().await?;
        if let Some(value) = &value {
            self.fill(key, value, ttl, epoch).await;
        }
        Ok(value)
    }

    /// Delete exact keys. Returns how many entries were removed.
    pub async fn invalidate(&self, keys: &[String]) -> usize {
        if keys.is_empty() {
            return 0;
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let label = keys[0].as_str();
        let deleted = self
            .guarded(label, "del", self.store.del(keys))
            .await
            .unwrap_or(0);

        for key in keys {
            self.metrics.record_invalidation(key);
        }
        debug!(keys = ?keys, deleted, "Cache invalidate");
        deleted
    }

    /// Delete every key starting with `prefix`. Returns how many entries were removed.
    pub async fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        if prefix.is_empty() {
            warn!("Refusing to invalidate with an empty prefix");
            return 0;
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let deleted = self
            .guarded(prefix, "del_prefix", self.store.del_prefix(prefix))
            .await
            .unwrap_or(0);

        self.metrics.record_invalidation(prefix);
        debug!(prefix = %prefix, deleted, "Cache invalidate by prefix");
        deleted
    }

    /// Write-path invalidation for one entity: its own key plus every key of
    /// its collection.
    pub async fn invalidate_entity(&self, exact_key: &str, collection_prefix: &str) -> usize {
        let exact = self.invalidate(&[exact_key.to_string()]).await;
        let collection = self.invalidate_by_prefix(collection_prefix).await;
        exact + collection
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.guarded(key, "get", self.store.get(key)).await {
            Some(Some(raw)) => raw,
            Some(None) => {
                debug!(key = %key, "Cache miss");
                self.metrics.record_miss(key);
                return None;
            }
            // Store unavailable: bypass
            None => return None,
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                self.metrics.record_hit(key);
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache deserialization failed");
                self.metrics.record_error(key, "deserialize");
                // Delete corrupted cache entry
                let _ = self
                    .guarded(key, "del", self.store.del(&[key.to_string()]))
                    .await;
                None
            }
        }
    }

    async fn fill<T: Serialize>(&self, key: &str, value: &T, ttl: Duration, epoch: u64) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(key = %key, "Invalidated while computing, not caching");
            return;
        }

        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache serialization failed");
                self.metrics.record_error(key, "serialize");
                return;
            }
        };

        if self
            .guarded(key, "set", self.store.set_ex(key, data, ttl))
            .await
            .is_none()
        {
            return;
        }

        // An invalidation may have run its delete before the write landed
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(key = %key, "Invalidated while writing, dropping entry");
            let _ = self
                .guarded(key, "del", self.store.del(&[key.to_string()]))
                .await;
            return;
        }

        debug!(key = %key, ttl = ttl.as_secs(), "Cache set");
        self.metrics.record_write(key);
    }

    /// Run a store operation under the timeout, logging and counting failures
    async fn guarded<T, Fut>(&self, key: &str, op: &'static str, fut: Fut) -> Option<T>
    where
        Fut: Future<Output = CacheResult<T>>,
    {
        let err = match with_timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(TimeoutError::Elapsed(after)) => CacheError::Timeout(after),
        };

        warn!(key = %key, op, error = %err, "Cache operation failed, continuing without cache");
        self.metrics.record_error(key, err.kind());
        None
    }
}
