//! Builder for configuring gate instances

use std::sync::Arc;
use std::time::Duration;

use super::Gate;
use crate::admission::{AdmissionControl, DEFAULT_STALE_AFTER};
use crate::cache::{CacheConfig, ResultCache};
use crate::providers::{ActorInvoker, NoopLedger, UsageLedger};
use crate::server::config::Config;
use crate::{HeimdallError, Result};

/// Default hard timeout for one external invocation.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(120);

/// Builder for configuring gate instances.
///
/// An admission authority and an invoker are required. The cache defaults
/// to an in-memory [`ResultCache`] and the ledger to [`NoopLedger`].
pub struct GateBuilder {
    cache: Option<ResultCache>,
    cache_config: CacheConfig,
    admission: Option<Arc<dyn AdmissionControl>>,
    invoker: Option<Arc<dyn ActorInvoker>>,
    ledger: Option<Arc<dyn UsageLedger>>,
    invoke_timeout: Duration,
    stale_after: Duration,
}

impl GateBuilder {
    pub fn new() -> Self {
        Self {
            cache: None,
            cache_config: CacheConfig::default(),
            admission: None,
            invoker: None,
            ledger: None,
            invoke_timeout: DEFAULT_INVOKE_TIMEOUT,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Apply timeouts and cache settings from a loaded [`Config`].
    pub fn config(mut self, config: &Config) -> Self {
        self.cache_config = config.cache_config();
        self.invoke_timeout = config.actor_timeout();
        self.stale_after = config.stale_after();
        self
    }

    /// Use the given admission authority (local actor or remote client).
    pub fn admission(mut self, admission: Arc<dyn AdmissionControl>) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Use the given actor invoker.
    pub fn invoker(mut self, invoker: Arc<dyn ActorInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Report usage to the given ledger.
    pub fn ledger(mut self, ledger: Arc<dyn UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Use a prebuilt cache (e.g. over a shared backend).
    ///
    /// Its default TTL replaces the configured cache TTL.
    pub fn cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the in-memory cache configuration.
    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Set the hard timeout for one external invocation.
    pub fn invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// Set the staleness threshold used by [`Gate::sweep`].
    pub fn stale_after(mut self, age: Duration) -> Self {
        self.stale_after = age;
        self
    }

    /// Build the gate.
    ///
    /// Fails when no admission authority or invoker is configured, or when
    /// the staleness threshold does not exceed the invocation timeout (a
    /// healthy slot would be reclaimed while its call is still running).
    pub fn build(self) -> Result<Gate> {
        let admission = self.admission.ok_or_else(|| {
            HeimdallError::Configuration("no admission authority configured".into())
        })?;
        let invoker = self
            .invoker
            .ok_or_else(|| HeimdallError::Configuration("no actor invoker configured".into()))?;

        if self.invoke_timeout.is_zero() {
            return Err(HeimdallError::Configuration(
                "invoke timeout must be greater than zero".into(),
            ));
        }
        if self.stale_after <= self.invoke_timeout {
            return Err(HeimdallError::Configuration(format!(
                "stale threshold ({}s) must exceed the invoke timeout ({}s)",
                self.stale_after.as_secs(),
                self.invoke_timeout.as_secs()
            )));
        }

        let cache = self
            .cache
            .unwrap_or_else(|| ResultCache::new(&self.cache_config));
        let cache_ttl = cache.default_ttl();

        Ok(Gate {
            cache,
            admission,
            invoker,
            ledger: self.ledger.unwrap_or_else(|| Arc::new(NoopLedger)),
            cache_ttl,
            invoke_timeout: self.invoke_timeout,
            stale_after: self.stale_after,
        })
    }
}

impl Default for GateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
