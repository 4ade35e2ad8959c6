//! Session startup wiring.
//!
//! Ties the startup sequence together in the order the components require:
//! version gate first (so stale layouts are purged before anything parses
//! them), then roster, ledger, and settings - each with its own recovery or
//! default behavior.

use haven_store::{DurableStore, check_schema_version};
use haven_types::Settings;

use crate::ledger::HistoryLedger;
use crate::roster::AgentRoster;
use crate::settings::load_settings;

/// Everything a running chat front end needs from persistence.
#[derive(Debug)]
pub struct Session {
    pub store: DurableStore,
    pub roster: AgentRoster,
    pub ledger: HistoryLedger,
    pub settings: Settings,
}

impl Session {
    /// Run the startup sequence over an already-probed store.
    #[must_use]
    pub fn start(mut store: DurableStore, app_version: &str) -> Self {
        check_schema_version(&mut store, app_version);

        let roster = AgentRoster::load(&mut store);
        let ledger = HistoryLedger::load(&mut store);
        let settings = load_settings(&store);

        Self {
            store,
            roster,
            ledger,
            settings,
        }
    }
}
