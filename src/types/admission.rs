//! Admission decision types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::HeimdallError;

/// Outcome of a request for a slot.
///
/// When `granted` is false no slot was created and the caller must not
/// invoke the external operation. `estimated_wait_secs` is present only on
/// denial and is a heuristic, not a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResult {
    pub granted: bool,
    pub current_slots: usize,
    pub max_slots: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_wait_secs: Option<u64>,
}

impl AdmissionResult {
    /// A granted result after the new slot was counted.
    pub fn granted(current_slots: usize, max_slots: usize) -> Self {
        Self {
            granted: true,
            current_slots,
            max_slots,
            estimated_wait_secs: None,
        }
    }

    /// A denied result carrying the advisory wait.
    pub fn denied(current_slots: usize, max_slots: usize, estimated_wait: Duration) -> Self {
        Self {
            granted: false,
            current_slots,
            max_slots,
            estimated_wait_secs: Some(estimated_wait.as_secs()),
        }
    }

    /// Advisory wait, present only on denial.
    pub fn estimated_wait(&self) -> Option<Duration> {
        self.estimated_wait_secs.map(Duration::from_secs)
    }

    /// Convert a denial into [`HeimdallError::AdmissionDenied`].
    ///
    /// Returns `Ok(self)` when granted.
    pub fn into_granted(self) -> Result<Self, HeimdallError> {
        if self.granted {
            return Ok(self);
        }
        Err(HeimdallError::AdmissionDenied {
            current_slots: self.current_slots,
            max_slots: self.max_slots,
            estimated_wait: self.estimated_wait().unwrap_or_default(),
        })
    }
}

/// Read-only snapshot of the authority's occupancy, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionStatus {
    pub current_slots: usize,
    pub max_slots: usize,
    /// Age of the oldest outstanding slot in seconds, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_slot_age_secs: Option<u64>,
}
