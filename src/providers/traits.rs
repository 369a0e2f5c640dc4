//! Traits for the collaborators the gate calls out to.
//!
//! The scraping actor and the billing ledger are owned by someone else.
//! The gate only sees these two seams, which keeps it testable with mocks
//! and lets deployments swap transports without touching admission logic.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::types::{Payload, UsageEvent};

// ============================================================================
// Actor invoker
// ============================================================================

/// Runs one external operation to completion.
///
/// Implementations should honour `timeout` themselves where the transport
/// allows it. The gate wraps every call in its own hard timeout regardless
/// and never retries.
#[async_trait]
pub trait ActorInvoker: Send + Sync {
    /// Invoker name for logging/debugging.
    fn name(&self) -> &str;

    /// Invoke `operation_tag` with `params`.
    ///
    /// Fails with [`ExternalTimeout`](crate::HeimdallError::ExternalTimeout)
    /// or [`ExternalFailure`](crate::HeimdallError::ExternalFailure).
    async fn invoke(&self, operation_tag: &str, params: &Value, timeout: Duration)
    -> Result<Payload>;
}

// ============================================================================
// Usage ledger
// ============================================================================

/// Receives one event per served request, after the fact, for metering.
///
/// The gate does not enforce balances; it only reports. Errors returned
/// here are logged and never fail the request.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn record(&self, event: UsageEvent) -> Result<()>;
}
