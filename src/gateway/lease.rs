//! Release guard for a granted slot.

use std::sync::Arc;

use tracing::warn;

use crate::admission::AdmissionControl;
use crate::types::HolderId;

/// Owns the obligation to release one (possibly) granted slot.
///
/// Call [`release`](Self::release) on the normal path. If the guard is
/// dropped without it (the request future was cancelled, or a panic
/// unwound through it), the release is spawned onto the current runtime.
/// When no runtime is available the stale sweep reclaims the slot later.
pub(crate) struct SlotLease {
    admission: Arc<dyn AdmissionControl>,
    holder: Option<HolderId>,
}

impl SlotLease {
    pub(crate) fn new(admission: Arc<dyn AdmissionControl>, holder: HolderId) -> Self {
        Self {
            admission,
            holder: Some(holder),
        }
    }

    /// Drop the obligation without releasing: nothing was granted.
    pub(crate) fn disarm(mut self) {
        self.holder = None;
    }

    pub(crate) async fn release(mut self) {
        if let Some(holder) = &self.holder {
            release_logged(self.admission.as_ref(), holder).await;
        }
        // Cleared only after the call returned: if this future is dropped
        // mid-release, Drop sends another (idempotent) release.
        self.holder = None;
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        let Some(holder) = self.holder.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let admission = Arc::clone(&self.admission);
                handle.spawn(async move {
                    release_logged(admission.as_ref(), &holder).await;
                });
            }
            Err(_) => warn!(
                holder = %holder,
                "no runtime to release slot, leaving it to the stale sweep"
            ),
        }
    }
}

async fn release_logged(admission: &dyn AdmissionControl, holder: &HolderId) {
    if let Err(e) = admission.release(holder).await {
        warn!(
            holder = %holder,
            error = %e,
            "slot release failed, leaving it to the stale sweep"
        );
    }
}
