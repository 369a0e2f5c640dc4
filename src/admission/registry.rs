//! Slot registry: the admission state machine.
//!
//! [`SlotRegistry`] is plain synchronous state. It owns the slot map and
//! the hold-time average, and takes the current time as an argument so that
//! every operation (stale cleanup included) is a pure function of registry
//! state and `now`. Linearizability comes from whoever owns the registry;
//! see [`LocalAdmission`](super::LocalAdmission).

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::WaitEstimate;
use crate::types::{AdmissionResult, AdmissionStatus, HolderId};
use crate::{HeimdallError, Result};

/// Weight of the newest sample in the hold-time average.
const HOLD_EWMA_ALPHA: f64 = 0.2;

/// A lease held by one caller against the global capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub holder: HolderId,
    pub operation_tag: String,
    pub acquired_at: Instant,
}

impl Slot {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.acquired_at)
    }
}

/// Bounded set of outstanding slots, keyed by holder.
///
/// Occupancy is the number of entries in the map, so it can never go
/// negative and a slot can never be released twice.
#[derive(Debug)]
pub struct SlotRegistry {
    capacity: usize,
    slots: HashMap<HolderId, Slot>,
    wait: WaitEstimate,
    avg_hold: Option<Duration>,
}

impl SlotRegistry {
    /// Create an empty registry. Capacity has a minimum of 1.
    pub fn new(capacity: usize, wait: WaitEstimate) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: HashMap::new(),
            wait,
            avg_hold: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupancy(&self) -> usize {
        self.slots.len()
    }

    pub fn holds(&self, holder: &HolderId) -> bool {
        self.slots.contains_key(holder)
    }

    /// Grant a slot if one is free.
    ///
    /// A denial leaves the registry untouched. A holder that already owns a
    /// slot is rejected with [`HeimdallError::InvalidHolder`].
    pub fn acquire(
        &mut self,
        holder: HolderId,
        operation_tag: &str,
        now: Instant,
    ) -> Result<AdmissionResult> {
        if self.slots.contains_key(&holder) {
            return Err(HeimdallError::InvalidHolder(format!(
                "{holder} already holds a slot"
            )));
        }
        if self.slots.len() >= self.capacity {
            return Ok(AdmissionResult::denied(
                self.slots.len(),
                self.capacity,
                self.estimate_wait(now),
            ));
        }
        self.slots.insert(
            holder.clone(),
            Slot {
                holder,
                operation_tag: operation_tag.to_owned(),
                acquired_at: now,
            },
        );
        Ok(AdmissionResult::granted(self.slots.len(), self.capacity))
    }

    /// Remove the holder's slot, if any. Unknown holders are a no-op.
    ///
    /// The hold duration of a released slot feeds the wait estimate.
    pub fn release(&mut self, holder: &HolderId, now: Instant) -> Option<Slot> {
        let slot = self.slots.remove(holder)?;
        self.record_hold(slot.age(now));
        Some(slot)
    }

    /// Drop the holder's slot without recording its hold time.
    pub(crate) fn cleanup_holder(&mut self, holder: &HolderId) -> Option<Slot> {
        self.slots.remove(holder)
    }

    /// Force-release every slot older than `max_age`.
    ///
    /// Idempotent: a second call with the same `now` reclaims nothing.
    /// Reclaimed slots do not feed the wait estimate.
    pub fn cleanup_stale(&mut self, max_age: Duration, now: Instant) -> Vec<Slot> {
        let stale: Vec<HolderId> = self
            .slots
            .values()
            .filter(|slot| slot.age(now) > max_age)
            .map(|slot| slot.holder.clone())
            .collect();
        stale
            .iter()
            .filter_map(|holder| self.slots.remove(holder))
            .collect()
    }

    pub fn status(&self, now: Instant) -> AdmissionStatus {
        AdmissionStatus {
            current_slots: self.slots.len(),
            max_slots: self.capacity,
            oldest_slot_age_secs: self.oldest_age(now).map(|age| age.as_secs()),
        }
    }

    /// Advisory wait for a denied caller, in whole seconds, at least 1s.
    pub fn estimate_wait(&self, now: Instant) -> Duration {
        let estimate = match self.wait {
            WaitEstimate::Fixed(d) => d,
            WaitEstimate::AverageHold { fallback } => match self.avg_hold {
                // The oldest slot is the likeliest to finish first.
                Some(avg) => avg.saturating_sub(self.oldest_age(now).unwrap_or_default()),
                None => fallback,
            },
        };
        round_up_secs(estimate).max(Duration::from_secs(1))
    }

    fn oldest_age(&self, now: Instant) -> Option<Duration> {
        self.slots.values().map(|slot| slot.age(now)).max()
    }

    fn record_hold(&mut self, held: Duration) {
        self.avg_hold = Some(match self.avg_hold {
            Some(avg) => Duration::from_secs_f64(
                avg.as_secs_f64() * (1.0 - HOLD_EWMA_ALPHA) + held.as_secs_f64() * HOLD_EWMA_ALPHA,
            ),
            None => held,
        });
    }
}

fn round_up_secs(d: Duration) -> Duration {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    Duration::from_secs(secs)
}
