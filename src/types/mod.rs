//! Public types for the Heimdall API.

mod admission;
mod holder;
mod usage;

pub use admission::{AdmissionResult, AdmissionStatus};
pub use holder::{HolderId, MAX_HOLDER_LEN};
pub use usage::{UsageEvent, UsageOutcome};

/// Result payload of the external operation. Opaque to the core.
pub type Payload = serde_json::Value;
