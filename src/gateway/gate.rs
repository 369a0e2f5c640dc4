//! Gate: cache, admission and invocation composed into one request path.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};

use super::builder::GateBuilder;
use super::lease::SlotLease;
use crate::admission::AdmissionControl;
use crate::cache::ResultCache;
use crate::providers::{ActorInvoker, UsageLedger};
use crate::telemetry;
use crate::types::{HolderId, Payload, UsageEvent, UsageOutcome};
use crate::{HeimdallError, Result};

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Served from the result cache without admission.
    Cache,
    /// Computed by the external actor under a granted slot.
    Fresh,
}

/// Payload returned by [`Gate::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct GateResponse {
    pub payload: Payload,
    pub source: Source,
}

/// Admission-controlled, cache-fronted path to the external actor.
///
/// For each request:
///
/// ```text
/// fingerprint ─► cache hit? ──yes──► return (no slot used)
///                    │ no
///                    ▼
///                 acquire ──denied──► AdmissionDenied (fail fast)
///                    │ granted
///                    ▼
///        invoke (hard timeout) ─► release ─► cache on success
/// ```
///
/// The slot is released on every exit path after a grant: success, error,
/// timeout, panic in the invoker, and cancellation of the request future.
/// An `acquire` that fails in transit is followed by a best-effort release,
/// since the authority may have granted before the reply was lost.
pub struct Gate {
    pub(crate) cache: ResultCache,
    pub(crate) admission: Arc<dyn AdmissionControl>,
    pub(crate) invoker: Arc<dyn ActorInvoker>,
    pub(crate) ledger: Arc<dyn UsageLedger>,
    pub(crate) cache_ttl: Duration,
    pub(crate) invoke_timeout: Duration,
    pub(crate) stale_after: Duration,
}

impl Gate {
    /// Create a new builder for configuring the gate.
    pub fn builder() -> GateBuilder {
        GateBuilder::new()
    }

    /// The result cache in front of admission.
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Serve one request for `operation_tag` with `params`.
    ///
    /// Only [`AdmissionDenied`](HeimdallError::AdmissionDenied),
    /// [`ExternalTimeout`](HeimdallError::ExternalTimeout) and
    /// [`ExternalFailure`](HeimdallError::ExternalFailure) are expected here,
    /// plus transport errors when the admission authority is unreachable.
    #[instrument(skip(self, holder, operation_tag, params), fields(holder = %holder, operation = operation_tag))]
    pub async fn run(
        &self,
        holder: &HolderId,
        operation_tag: &str,
        params: &Value,
    ) -> Result<GateResponse> {
        if let Some(payload) = self.cache.lookup(operation_tag, params).await {
            self.report(holder, operation_tag, UsageOutcome::CacheHit)
                .await;
            return Ok(GateResponse {
                payload,
                source: Source::Cache,
            });
        }

        // Armed before the request goes out: a grant whose reply is lost to a
        // transport error or to cancellation is still released.
        let lease = SlotLease::new(Arc::clone(&self.admission), holder.clone());
        let admission = match self.admission.acquire(holder, operation_tag).await {
            Ok(admission) => admission,
            // The slot under this id belongs to another in-flight request.
            Err(e @ HeimdallError::InvalidHolder(_)) => {
                lease.disarm();
                return Err(e);
            }
            Err(e) => {
                lease.release().await;
                return Err(e);
            }
        };
        let outcome = if admission.granted { "granted" } else { "denied" };
        metrics::counter!(telemetry::ADMISSION_TOTAL,
            "operation" => operation_tag.to_owned(),
            "outcome" => outcome,
        )
        .increment(1);
        if !admission.granted {
            warn!(
                operation = operation_tag,
                current_slots = admission.current_slots,
                max_slots = admission.max_slots,
                estimated_wait_secs = admission.estimated_wait_secs,
                "admission denied"
            );
        }
        if let Err(denied) = admission.into_granted() {
            lease.disarm();
            return Err(denied);
        }

        let result = self.invoke(operation_tag, params).await;
        lease.release().await;

        match result {
            Ok(payload) => {
                self.cache
                    .store(operation_tag, params, payload.clone(), self.cache_ttl)
                    .await;
                self.report(holder, operation_tag, UsageOutcome::FreshSuccess)
                    .await;
                Ok(GateResponse {
                    payload,
                    source: Source::Fresh,
                })
            }
            Err(e) => {
                self.report(holder, operation_tag, UsageOutcome::FreshFailure)
                    .await;
                Err(e)
            }
        }
    }

    /// Reclaim slots older than the configured staleness threshold.
    pub async fn sweep(&self) -> Result<usize> {
        self.admission.cleanup_stale(self.stale_after).await
    }

    /// Run [`sweep`](Self::sweep) every `period` on a background task.
    ///
    /// Meant for deployments whose authority does not sweep on its own.
    /// Abort the returned handle to stop it.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let admission = Arc::clone(&self.admission);
        let stale_after = self.stale_after;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match admission.cleanup_stale(stale_after).await {
                    Ok(0) => {}
                    Ok(n) => debug!(reclaimed = n, "stale sweep"),
                    Err(e) => warn!(error = %e, "stale sweep failed"),
                }
            }
        })
    }

    /// Invoke the actor under the hard timeout, turning panics into errors.
    async fn invoke(&self, operation_tag: &str, params: &Value) -> Result<Payload> {
        let start = Instant::now();
        let call = AssertUnwindSafe(self.invoker.invoke(operation_tag, params, self.invoke_timeout))
            .catch_unwind();

        let result = match tokio::time::timeout(self.invoke_timeout, call).await {
            Err(_) => Err(HeimdallError::ExternalTimeout {
                timeout: self.invoke_timeout,
            }),
            Ok(Err(panic)) => Err(HeimdallError::ExternalFailure(format!(
                "invoker {} panicked: {}",
                self.invoker.name(),
                panic_message(panic.as_ref())
            ))),
            Ok(Ok(result)) => result.map_err(into_external),
        };

        let status = match &result {
            Ok(_) => "ok",
            Err(HeimdallError::ExternalTimeout { .. }) => "timeout",
            Err(_) => "error",
        };
        metrics::counter!(telemetry::INVOCATIONS_TOTAL,
            "operation" => operation_tag.to_owned(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::INVOCATION_DURATION_SECONDS,
            "operation" => operation_tag.to_owned(),
        )
        .record(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            warn!(
                invoker = self.invoker.name(),
                operation = operation_tag,
                error = %e,
                "external operation failed"
            );
        }
        result
    }

    async fn report(&self, holder: &HolderId, operation_tag: &str, outcome: UsageOutcome) {
        let event = UsageEvent {
            holder: holder.clone(),
            operation_tag: operation_tag.to_owned(),
            outcome,
        };
        if let Err(e) = self.ledger.record(event).await {
            warn!(
                operation = operation_tag,
                outcome = outcome.as_str(),
                error = %e,
                "usage ledger rejected event"
            );
        }
    }
}

/// Map an invoker error onto the external-operation taxonomy.
fn into_external(err: HeimdallError) -> HeimdallError {
    match err {
        e @ (HeimdallError::ExternalTimeout { .. } | HeimdallError::ExternalFailure(_)) => e,
        other => HeimdallError::ExternalFailure(other.to_string()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
