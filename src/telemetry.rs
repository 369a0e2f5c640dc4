//! Telemetry metric name constants.
//!
//! Centralised metric names for heimdall operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `heimdall_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: operation tag of the external actor
//! - `outcome`: admission outcome: "granted" or "denied"
//! - `status`: invocation outcome: "ok", "timeout" or "error"

/// Total cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "heimdall_cache_hits_total";

/// Total cache misses (including misses caused by backend errors).
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "heimdall_cache_misses_total";

/// Total cache backend errors swallowed by the degradation path.
///
/// Labels: `access` ("get" | "put").
pub const CACHE_ERRORS_TOTAL: &str = "heimdall_cache_errors_total";

/// Total admission decisions.
///
/// Labels: `operation`, `outcome` ("granted" | "denied").
pub const ADMISSION_TOTAL: &str = "heimdall_admission_total";

/// Slots currently held, as seen by the authority.
pub const SLOTS_IN_USE: &str = "heimdall_slots_in_use";

/// Total slots force-released by the staleness sweep.
pub const SLOTS_RECLAIMED_TOTAL: &str = "heimdall_slots_reclaimed_total";

/// Total external invocations.
///
/// Labels: `operation`, `status` ("ok" | "timeout" | "error").
pub const INVOCATIONS_TOTAL: &str = "heimdall_invocations_total";

/// External invocation duration in seconds.
///
/// Labels: `operation`.
pub const INVOCATION_DURATION_SECONDS: &str = "heimdall_invocation_duration_seconds";
