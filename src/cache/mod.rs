//! Result cache in front of the admission controller.
//!
//! [`ResultCache`] maps a fingerprint of (operation, params) to a payload
//! computed earlier. It is consulted before any slot is requested, so a hit
//! never consumes admission capacity.
//!
//! # Degradation
//!
//! The cache is a non-critical dependency. Backend errors on read are turned
//! into misses and backend errors on write are logged and dropped. Callers of
//! [`ResultCache::lookup`] and [`ResultCache::store`] never see a cache error,
//! and a broken cache never looks like an admission failure.
//!
//! # Backends
//!
//! [`MemoryBackend`] is the default, a bounded moka cache with per-entry
//! expiry. A shared store (for several processes) plugs in through the
//! [`CacheBackend`] trait; keys are stable SHA-256 fingerprints, so they mean
//! the same thing in every process.

pub mod key;
pub mod memory;

pub use key::{CacheKey, fingerprint};
pub use memory::MemoryBackend;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::Result;
use crate::telemetry;
use crate::types::Payload;

/// Configuration for the result cache.
///
/// ```rust
/// # use heimdall::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(10_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live used by [`ResultCache::store_default`]. Default: 1 hour.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A stored payload with the metadata needed to expire it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPayload {
    pub payload: Payload,
    pub stored_at: SystemTime,
    pub ttl: Duration,
}

impl CachedPayload {
    pub fn new(payload: Payload, ttl: Duration) -> Self {
        Self {
            payload,
            stored_at: SystemTime::now(),
            ttl,
        }
    }

    /// Whether the entry is past `stored_at + ttl`.
    ///
    /// A clock that went backwards counts as not expired.
    pub fn is_expired(&self) -> bool {
        self.stored_at
            .elapsed()
            .map(|age| age >= self.ttl)
            .unwrap_or(false)
    }
}

/// Storage behind [`ResultCache`].
///
/// Implementations may fail; [`ResultCache`] absorbs every error.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Fetch an entry. Expired entries may be returned; the caller filters.
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedPayload>>;

    /// Store an entry, replacing any existing one for `key`.
    async fn put(&self, key: CacheKey, value: CachedPayload) -> Result<()>;
}

/// Fingerprinting, degrading cache facade.
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
}

impl ResultCache {
    /// Create a cache backed by an in-memory [`MemoryBackend`].
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new(config.max_entries)),
            default_ttl: config.ttl,
        }
    }

    /// Create a cache over a custom backend.
    pub fn with_backend(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
        }
    }

    /// TTL applied by [`store_default`](Self::store_default).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up the payload for `(operation, params)`.
    ///
    /// Returns `None` on miss, on expiry, and on backend failure.
    pub async fn lookup(&self, operation: &str, params: &Value) -> Option<Payload> {
        let key = fingerprint(operation, params);
        match self.get(&key).await {
            Some(payload) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation.to_owned())
                    .increment(1);
                debug!(operation, fingerprint = %key, "cache hit");
                Some(payload)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation.to_owned())
                    .increment(1);
                debug!(operation, fingerprint = %key, "cache miss");
                None
            }
        }
    }

    /// Store `payload` for `(operation, params)` with an explicit TTL.
    ///
    /// Failures are logged and ignored.
    pub async fn store(&self, operation: &str, params: &Value, payload: Payload, ttl: Duration) {
        let key = fingerprint(operation, params);
        self.put(key, payload, ttl).await;
    }

    /// Store with the configured default TTL.
    pub async fn store_default(&self, operation: &str, params: &Value, payload: Payload) {
        self.store(operation, params, payload, self.default_ttl)
            .await;
    }

    /// Key-level read. Expired entries and backend errors read as absent.
    pub async fn get(&self, key: &CacheKey) -> Option<Payload> {
        match self.backend.get(key).await {
            Ok(Some(entry)) if !entry.is_expired() => Some(entry.payload),
            Ok(_) => None,
            Err(e) => {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "access" => "get").increment(1);
                warn!(
                    backend = self.backend.name(),
                    fingerprint = %key,
                    error = %e,
                    "cache read failed, treating as miss"
                );
                None
            }
        }
    }

    /// Key-level write. Overwrites; errors are logged and dropped.
    pub async fn put(&self, key: CacheKey, payload: Payload, ttl: Duration) {
        let entry = CachedPayload::new(payload, ttl);
        if let Err(e) = self.backend.put(key.clone(), entry).await {
            metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "access" => "put").increment(1);
            warn!(
                backend = self.backend.name(),
                fingerprint = %key,
                error = %e,
                "cache write failed, result not cached"
            );
        }
    }
}
