//! Global admission control for external operations.
//!
//! The admission controller caps how many long-running external operations
//! the whole service has in flight. It never queues: each request is either
//! granted a slot at once or denied at once with an advisory wait.
//!
//! # Layers
//!
//! - [`SlotRegistry`]: the synchronous state machine (slots, capacity,
//!   hold-time average).
//! - [`LocalAdmission`]: an actor task that exclusively owns one registry.
//!   Commands arrive over a channel and are applied one at a time, which
//!   makes `acquire`/`release` linearizable for every handle.
//! - [`RemoteAdmission`](crate::client::RemoteAdmission): forwards the same
//!   operations to a `heimdalld` daemon, so many processes share one
//!   authority.
//!
//! All of them implement [`AdmissionControl`], the seam the
//! [`Gate`](crate::Gate) talks to.
//!
//! # Recovery
//!
//! A holder that crashes or hangs never reaches its release path. Every
//! acquire first reclaims slots older than the staleness threshold, and the
//! actor can also sweep on a timer. Reclaim and release both remove the map
//! entry, so a slot is never counted down twice.

pub mod local;
pub mod registry;

pub use local::LocalAdmission;
pub use registry::{Slot, SlotRegistry};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::{AdmissionResult, AdmissionStatus, HolderId};

/// Default global capacity.
pub const DEFAULT_CAPACITY: usize = 32;

/// Default age after which a slot is considered abandoned.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

/// Default advisory wait reported on denial.
pub const DEFAULT_WAIT_ESTIMATE: Duration = Duration::from_secs(30);

/// Heuristic for the advisory wait reported to denied callers.
///
/// There is no queue behind the controller, so no estimate reflects real
/// queueing. Both strategies are hints for the caller's own backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitEstimate {
    /// Always report the same wait.
    Fixed(Duration),
    /// Average hold time of completed slots minus the age of the oldest
    /// outstanding slot. Uses `fallback` until a slot has been released.
    AverageHold { fallback: Duration },
}

impl Default for WaitEstimate {
    fn default() -> Self {
        WaitEstimate::Fixed(DEFAULT_WAIT_ESTIMATE)
    }
}

/// Configuration for an admission authority.
///
/// ```rust
/// # use heimdall::AdmissionConfig;
/// # use std::time::Duration;
/// let config = AdmissionConfig::new()
///     .capacity(16)
///     .stale_after(Duration::from_secs(600))
///     .sweep_interval(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Maximum concurrent slots. Default: 32.
    pub capacity: usize,
    /// Slots older than this are reclaimed. Default: 5 minutes.
    pub stale_after: Duration,
    /// Period of the background sweep, if any. Default: none (lazy sweep
    /// on acquire only).
    pub sweep_interval: Option<Duration>,
    /// Advisory wait heuristic. Default: fixed 30 seconds.
    pub wait: WaitEstimate,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            stale_after: DEFAULT_STALE_AFTER,
            sweep_interval: None,
            wait: WaitEstimate::default(),
        }
    }
}

impl AdmissionConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global capacity.
    pub fn capacity(mut self, n: usize) -> Self {
        self.capacity = n;
        self
    }

    /// Set the staleness threshold.
    pub fn stale_after(mut self, age: Duration) -> Self {
        self.stale_after = age;
        self
    }

    /// Enable a periodic stale sweep.
    pub fn sweep_interval(mut self, period: Duration) -> Self {
        self.sweep_interval = Some(period);
        self
    }

    /// Set the wait heuristic.
    pub fn wait_estimate(mut self, wait: WaitEstimate) -> Self {
        self.wait = wait;
        self
    }
}

/// Operations of an admission authority.
///
/// Implementations must make `acquire` a single atomic check-and-increment
/// with respect to every other caller of the same authority.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Request a slot for `holder`. Never waits for capacity.
    async fn acquire(&self, holder: &HolderId, operation_tag: &str) -> Result<AdmissionResult>;

    /// Release the holder's slot. Unknown holders are a no-op.
    async fn release(&self, holder: &HolderId) -> Result<()>;

    /// Force-release slots older than `max_age`. Returns the number reclaimed.
    async fn cleanup_stale(&self, max_age: Duration) -> Result<usize>;

    /// Read-only occupancy snapshot, for diagnostics.
    async fn status(&self) -> Result<AdmissionStatus>;
}
