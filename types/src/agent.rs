//! Agent profile domain model.

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// One configured agent as stored in the roster.
///
/// `system_prompt` and `greeting` default to empty on deserialization so
/// profiles written by older releases keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub greeting: String,
}

impl AgentProfile {
    #[must_use]
    pub fn new(id: AgentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            system_prompt: String::new(),
            greeting: String::new(),
        }
    }
}
