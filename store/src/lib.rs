//! Resilient tiered key-value persistence.
//!
//! This crate provides:
//! - Ranked storage tiers behind one capability interface
//! - A startup probe that determines which tiers actually work
//! - A durable store with write verification, tier fallback, best-effort
//!   mirroring, and quota-triggered eviction
//! - A recovery scanner that searches every tier and alias for the most
//!   complete prior value of a logical key
//! - One-time blunt invalidation gated on a stored version stamp
//!
//! # Architecture
//!
//! ```text
//! DurableStore
//! ├── tiers: Vec<Box<dyn StorageTier>>   (primary > secondary > memory)
//! ├── caps: CapabilitySet                (probed once, immutable)
//! ├── policies: per-key KeyPolicy        (backup / device-mirror flags)
//! └── notifier: Option<Box<dyn StoreNotifier>>
//!
//! recover::<T>(key)   read-only scan over every tier and alias
//! check_schema_version   purge-and-restamp on version mismatch
//! ```
//!
//! The store is the sole owner of physical alias naming; callers only ever
//! see logical keys.

mod durable;
mod file_tier;
mod migrate;
mod notify;
mod probe;
mod recover;
mod tier;

pub use durable::{
    DeviceClass, DurableStore, EVICTION_RETAINED_PER_AGENT, KEY_AGENTS, KEY_MESSAGE_HISTORIES,
    KEY_SETTINGS, KeyPolicy, LOW_PRIORITY_KEYS,
};
pub use file_tier::FileTier;
pub use migrate::{LOGICAL_KEYS, VERSION_STAMP_KEY, check_schema_version};
pub use notify::{StoreNotice, StoreNotifier};
pub use probe::{CapabilitySet, probe};
pub use recover::RecoverTarget;
pub use tier::{MemoryTier, StorageTier, TierError, TierRank};
