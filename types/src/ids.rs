//! Validated identifier types.
//!
//! `AgentId` enforces non-emptiness at construction time. Once you hold one,
//! every downstream layer can assume the id is usable as a map key and as a
//! display label.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of one configured agent.
///
/// # Invariants
///
/// - Never empty after `trim()`
///
/// # Serde
///
/// Serializes as a plain JSON string; deserialization re-validates, so a
/// ledger snapshot with a blank agent key fails to parse instead of silently
/// creating an unreachable entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

#[derive(Debug, Error)]
#[error("agent id must not be empty")]
pub struct EmptyAgentIdError;

impl AgentId {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyAgentIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyAgentIdError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for AgentId {
    type Error = EmptyAgentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for AgentId {
    type Error = EmptyAgentIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentId> for String {
    fn from(value: AgentId) -> Self {
        value.0
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// Lets maps keyed by `AgentId` be queried with a plain `&str`. Sound because
// `AgentId` ordering and hashing delegate to the inner string.
impl std::borrow::Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
