//! Per-agent conversation history with bounded retention.
//!
//! The ledger is append-only in memory and never edited in place; persisted
//! snapshots cap each agent at [`RETAINED_PER_AGENT`] entries, oldest
//! dropped first. Saving serializes the whole structure in one step, so a
//! snapshot always reflects a consistent in-memory state.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::warn;

use haven_store::{DurableStore, KEY_MESSAGE_HISTORIES};
use haven_types::{AgentId, ChatEntry, Role};

/// Entries kept per agent in persisted snapshots.
///
/// The quota-eviction path in the store truncates harder (20); the two
/// constants are intentionally separate.
pub const RETAINED_PER_AGENT: usize = 50;

/// How often the periodic flush re-saves the full ledger as a safety net
/// against missed explicit saves.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct HistoryLedger {
    histories: BTreeMap<AgentId, Vec<ChatEntry>>,
    last_flush: Instant,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            histories: BTreeMap::new(),
            last_flush: Instant::now(),
        }
    }

    /// Load the ledger from the store.
    ///
    /// An absent, unparseable, or empty stored ledger triggers the recovery
    /// scanner; a non-empty recovered value is re-committed explicitly
    /// (recovery itself never writes).
    #[must_use]
    pub fn load(store: &mut DurableStore) -> Self {
        let histories: BTreeMap<AgentId, Vec<ChatEntry>> = match store.get(KEY_MESSAGE_HISTORIES) {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("stored ledger did not parse: {e}");
                    BTreeMap::new()
                }
            },
            None => BTreeMap::new(),
        };

        if histories.is_empty()
            && let Some(recovered) = store.recover::<BTreeMap<AgentId, Vec<ChatEntry>>>(KEY_MESSAGE_HISTORIES)
        {
            let mut ledger = Self {
                histories: recovered,
                last_flush: Instant::now(),
            };
            ledger.save(store);
            return ledger;
        }

        Self {
            histories,
            last_flush: Instant::now(),
        }
    }

    /// Append one turn and save through the store.
    ///
    /// Returns false only for an empty agent id - the single caller-visible
    /// precondition failure. Save failures are handled internally (prune,
    /// retry once) and logged, never surfaced here.
    pub fn append(
        &mut self,
        store: &mut DurableStore,
        agent_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> bool {
        let Ok(id) = AgentId::new(agent_id) else {
            warn!("append rejected: empty agent id");
            return false;
        };

        self.histories.entry(id).or_default().push(ChatEntry {
            role,
            content: content.into(),
        });
        self.save(store);
        true
    }

    /// Replace an agent's sequence with empty, then save.
    ///
    /// Returns false when the agent had no history to clear.
    pub fn clear(&mut self, store: &mut DurableStore, agent_id: &str) -> bool {
        match self.histories.get_mut(agent_id) {
            Some(entries) => {
                entries.clear();
                self.save(store);
                true
            }
            None => false,
        }
    }

    /// The in-memory sequence for one agent; empty for unknown agents.
    #[must_use]
    pub fn history(&self, agent_id: &str) -> &[ChatEntry] {
        self.histories.get(agent_id).map_or(&[], Vec::as_slice)
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = &AgentId> {
        self.histories.keys()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Truncate every over-cap sequence to its most recent entries.
    ///
    /// Called automatically when a save fails; the in-memory structure stays
    /// unbounded otherwise.
    pub fn prune(&mut self) {
        for entries in self.histories.values_mut() {
            if entries.len() > RETAINED_PER_AGENT {
                let excess = entries.len() - RETAINED_PER_AGENT;
                entries.drain(..excess);
            }
        }
    }

    /// Serialize the bounded snapshot and push it through the store.
    ///
    /// On failure: prune the in-memory sequences, then retry exactly once.
    pub fn save(&mut self, store: &mut DurableStore) -> bool {
        if self.save_snapshot(store) {
            return true;
        }
        warn!("ledger save failed; pruning and retrying once");
        self.prune();
        self.save_snapshot(store)
    }

    /// True when the periodic flush interval has elapsed.
    #[must_use]
    pub fn flush_due(&self, now: Instant) -> bool {
        now.duration_since(self.last_flush) >= FLUSH_INTERVAL
    }

    /// Unconditional flush; resets the interval clock.
    pub fn flush(&mut self, store: &mut DurableStore, now: Instant) -> bool {
        self.last_flush = now;
        self.save(store)
    }

    /// Flush if the interval has elapsed. Intended to be driven from the
    /// host's event loop between message-handling steps.
    pub fn maybe_flush(&mut self, store: &mut DurableStore) -> bool {
        let now = Instant::now();
        if self.flush_due(now) {
            self.flush(store, now)
        } else {
            false
        }
    }

    fn save_snapshot(&self, store: &mut DurableStore) -> bool {
        match serde_json::to_string(&self.disk_snapshot()) {
            Ok(payload) => store.set(KEY_MESSAGE_HISTORIES, &payload),
            Err(e) => {
                warn!("ledger serialization failed: {e}");
                false
            }
        }
    }

    /// The persisted view: each agent capped at the most recent
    /// [`RETAINED_PER_AGENT`] entries, insertion order preserved.
    fn disk_snapshot(&self) -> BTreeMap<&AgentId, &[ChatEntry]> {
        self.histories
            .iter()
            .map(|(id, entries)| {
                let start = entries.len().saturating_sub(RETAINED_PER_AGENT);
                (id, &entries[start..])
            })
            .collect()
    }
}
