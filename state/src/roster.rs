//! The persisted agent roster.
//!
//! Agents are the highest-value data in the application - losing the roster
//! means losing every configured persona - so the `agents` key carries the
//! store's full redundancy policy and loading falls back to the recovery
//! scanner before declaring data loss.

use tracing::warn;

use haven_store::{DurableStore, KEY_AGENTS};
use haven_types::AgentProfile;

#[derive(Debug, Default)]
pub struct AgentRoster {
    agents: Vec<AgentProfile>,
}

impl AgentRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the roster, scanning backups and mirrors when the primary copy
    /// is missing or empty. A recovered roster is re-committed immediately.
    #[must_use]
    pub fn load(store: &mut DurableStore) -> Self {
        let agents: Vec<AgentProfile> = match store.get(KEY_AGENTS) {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("stored roster did not parse: {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        if agents.is_empty()
            && let Some(recovered) = store.recover::<Vec<AgentProfile>>(KEY_AGENTS)
        {
            let roster = Self { agents: recovered };
            roster.save(store);
            return roster;
        }

        Self { agents }
    }

    pub fn save(&self, store: &mut DurableStore) -> bool {
        match serde_json::to_string(&self.agents) {
            Ok(payload) => store.set(KEY_AGENTS, &payload),
            Err(e) => {
                warn!("roster serialization failed: {e}");
                false
            }
        }
    }

    /// Add or replace a profile by id, then save.
    pub fn upsert(&mut self, store: &mut DurableStore, profile: AgentProfile) -> bool {
        match self.agents.iter_mut().find(|a| a.id == profile.id) {
            Some(existing) => *existing = profile,
            None => self.agents.push(profile),
        }
        self.save(store)
    }

    /// Remove a profile by id, then save. Returns false when the id was not
    /// present (nothing is saved in that case).
    pub fn remove(&mut self, store: &mut DurableStore, agent_id: &str) -> bool {
        let before = self.agents.len();
        self.agents.retain(|a| a.id.as_str() != agent_id);
        if self.agents.len() == before {
            return false;
        }
        self.save(store);
        true
    }

    #[must_use]
    pub fn get(&self, agent_id: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.id.as_str() == agent_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentProfile> {
        self.agents.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
