//! Core domain types for Haven.
//!
//! This crate holds the vocabulary shared by the storage and state layers:
//! agent identifiers, chat entries, agent profiles, and settings. It performs
//! no IO and has no async - existence of a value is the proof of its
//! validity.

mod agent;
mod chat;
mod ids;
mod settings;

pub use agent::AgentProfile;
pub use chat::{ChatEntry, Role};
pub use ids::{AgentId, EmptyAgentIdError};
pub use settings::Settings;
