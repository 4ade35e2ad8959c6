//! Chat state built on the durable store.
//!
//! Everything here goes through [`haven_store::DurableStore`] exclusively -
//! no module in this crate touches a storage tier directly.
//!
//! ```text
//! Session
//! ├── ledger: HistoryLedger   per-agent bounded conversation log
//! ├── roster: AgentRoster     configured agents (high-value key)
//! └── settings: Settings      user tunables (first evicted under pressure)
//! ```

mod ledger;
mod roster;
mod session;
mod settings;

pub use ledger::{FLUSH_INTERVAL, HistoryLedger, RETAINED_PER_AGENT};
pub use roster::AgentRoster;
pub use session::Session;
pub use settings::{load_settings, save_settings};
