//! In-memory cache backend built on moka.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::{CacheBackend, CacheKey, CachedPayload};
use crate::Result;

/// Expires each entry after the TTL it was stored with.
///
/// Overwrites restart the clock with the new entry's TTL.
struct PerEntryTtl;

impl Expiry<CacheKey, CachedPayload> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CachedPayload,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CachedPayload,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded in-memory backend with per-entry expiry.
///
/// Thread-safe; moka handles concurrent access internally. Writes replace
/// whole entries, so readers never observe a partial value.
pub struct MemoryBackend {
    cache: Cache<CacheKey, CachedPayload>,
}

impl MemoryBackend {
    /// Create a backend holding at most `max_entries` entries.
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Number of live entries, after applying pending evictions.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CachedPayload>> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, key: CacheKey, value: CachedPayload) -> Result<()> {
        self.cache.insert(key, value).await;
        Ok(())
    }
}
