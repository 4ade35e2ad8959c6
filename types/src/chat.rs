//! Chat message domain model.
//!
//! A `ChatEntry` is one turn of one conversation as the ledger persists it:
//! a role tag plus the rendered content. Timestamps, token counts, and
//! display concerns live elsewhere; the persisted shape stays minimal so old
//! snapshots keep parsing across releases.

use serde::{Deserialize, Serialize};

/// Who produced a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
}

impl ChatEntry {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::User).expect("serialize"),
            "\"user\""
        );
        assert_eq!(
            serde_json::to_string(&Role::Assistant).expect("serialize"),
            "\"assistant\""
        );
    }

    #[test]
    fn entry_wire_shape_is_stable() {
        let entry = ChatEntry::user("hello");
        let json = serde_json::to_string(&entry).expect("serialize");
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }
}
