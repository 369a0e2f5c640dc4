//! Usage events reported to the billing ledger.

use serde::{Deserialize, Serialize};

use super::HolderId;

/// How a request was served, for metering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageOutcome {
    /// Served from the result cache; the actor was not invoked.
    CacheHit,
    /// The actor ran and returned a result.
    FreshSuccess,
    /// The actor ran and failed or timed out.
    FreshFailure,
}

impl UsageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageOutcome::CacheHit => "cache_hit",
            UsageOutcome::FreshSuccess => "fresh_success",
            UsageOutcome::FreshFailure => "fresh_failure",
        }
    }
}

/// One metered request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub holder: HolderId,
    pub operation_tag: String,
    pub outcome: UsageOutcome,
}
