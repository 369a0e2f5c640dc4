//! Caller identity for admission slots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{HeimdallError, Result};

/// Maximum length of a holder id in bytes.
pub const MAX_HOLDER_LEN: usize = 128;

/// Validated identity of a slot holder.
///
/// Construct with [`HolderId::new`] (validates) or [`HolderId::generate`]
/// (mints a unique id for one in-flight request of a session). Malformed
/// identities never reach the admission controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HolderId(String);

impl HolderId {
    /// Validate and wrap a holder id.
    ///
    /// Rejects empty ids, ids longer than [`MAX_HOLDER_LEN`] bytes, and ids
    /// containing whitespace or control characters.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(HeimdallError::InvalidHolder("holder id is empty".into()));
        }
        if id.len() > MAX_HOLDER_LEN {
            return Err(HeimdallError::InvalidHolder(format!(
                "holder id is {} bytes, limit is {MAX_HOLDER_LEN}",
                id.len()
            )));
        }
        if let Some(c) = id.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(HeimdallError::InvalidHolder(format!(
                "holder id contains forbidden character {c:?}"
            )));
        }
        Ok(Self(id))
    }

    /// Mint a fresh holder id scoped to `session`: `{session}:{uuid}`.
    ///
    /// One session may run several requests at once; each gets its own
    /// holder so their slots are released independently.
    pub fn generate(session: &str) -> Result<Self> {
        Self::new(format!("{session}:{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HolderId {
    type Error = HeimdallError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<HolderId> for String {
    fn from(value: HolderId) -> Self {
        value.0
    }
}
