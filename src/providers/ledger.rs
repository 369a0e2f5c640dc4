//! Built-in usage ledgers.

use async_trait::async_trait;
use tracing::info;

use super::traits::UsageLedger;
use crate::Result;
use crate::types::UsageEvent;

/// Ledger that writes each event to the `tracing` log.
///
/// Useful in development and as the default when billing lives in another
/// service that tails the logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLedger;

#[async_trait]
impl UsageLedger for TracingLedger {
    async fn record(&self, event: UsageEvent) -> Result<()> {
        info!(
            holder = %event.holder,
            operation = %event.operation_tag,
            outcome = event.outcome.as_str(),
            "usage"
        );
        Ok(())
    }
}

/// Ledger that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLedger;

#[async_trait]
impl UsageLedger for NoopLedger {
    async fn record(&self, _event: UsageEvent) -> Result<()> {
        Ok(())
    }
}
