//! In-process cache store
//!
//! Expiry follows the tokio clock, so paused-time tests can step past a TTL.
//! `set_outage` and `set_latency` simulate an unreachable or slow store.

use crate::store::CacheStore;
use crate::{CacheError, CacheResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
    outage: Arc<AtomicBool>,
    latency_ms: Arc<AtomicU64>,
}

struct Entry {
    value: String,
    expires_at: Instant,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation until switched off
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Delay every operation by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Whether a live (unexpired) entry exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Raw stored value, bypassing outage and latency
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn enter(&self) -> CacheResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.outage.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("memory store is down".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.enter().await?;

        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }

        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.enter().await?;

        // Expired entries are otherwise only dropped when read
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);

        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<usize> {
        self.enter().await?;

        let now = Instant::now();
        let deleted = keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|(_, entry)| entry.expires_at > now)
            .count();
        Ok(deleted)
    }

    async fn del_prefix(&self, prefix: &str) -> CacheResult<usize> {
        self.enter().await?;

        let now = Instant::now();
        let mut deleted = 0;
        self.entries.retain(|key, entry| {
            if key.starts_with(prefix) {
                if entry.expires_at > now {
                    deleted += 1;
                }
                false
            } else {
                true
            }
        });
        Ok(deleted)
    }
}
