//! Version-stamped blunt invalidation.
//!
//! A stored version stamp gates a one-time purge: when the stamp does not
//! match the running version, every known logical key and its aliases is
//! removed and the stamp is rewritten. This is deliberately not a merge or
//! an in-place migration - stale state from an incompatible release is worth
//! less than a clean start.

use tracing::{info, warn};

use crate::durable::{DurableStore, KEY_AGENTS, KEY_MESSAGE_HISTORIES, KEY_SETTINGS};

/// Key holding the version stamp of the release that last wrote the store.
pub const VERSION_STAMP_KEY: &str = "app_version";

/// Every logical key the store lays out.
pub const LOGICAL_KEYS: &[&str] = &[KEY_AGENTS, KEY_MESSAGE_HISTORIES, KEY_SETTINGS];

/// Keys written by older releases, purged alongside the current layout.
const LEGACY_KEYS: &[&str] = &[
    "currentAgent",
    "apiConfig",
    "chatHistory",
    "userSettings",
    "agentData",
    "apiKeys",
    "selectedAgent",
];

/// Purge all stored state if the version stamp does not match.
///
/// Runs at startup before anything is loaded. Returns true when a purge
/// happened. A missing stamp counts as a mismatch: first launch after
/// install gets a clean layout and a fresh stamp.
pub fn check_schema_version(store: &mut DurableStore, current_version: &str) -> bool {
    let stored = store.get(VERSION_STAMP_KEY);
    if stored.as_deref() == Some(current_version) {
        return false;
    }

    info!(
        stored = stored.as_deref().unwrap_or("<none>"),
        current = current_version,
        "version stamp mismatch, purging stored state"
    );

    for key in LOGICAL_KEYS.iter().chain(LEGACY_KEYS) {
        let removed = store.remove(key);
        if removed {
            info!(key, "purged");
        }
    }

    if !store.set(VERSION_STAMP_KEY, current_version) {
        warn!("failed to persist the new version stamp");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::physical_names;
    use crate::tier::{MemoryTier, StorageTier};

    fn memory_store() -> DurableStore {
        DurableStore::new(vec![Box::new(MemoryTier::new())])
    }

    #[test]
    fn first_launch_stamps_without_data_loss_concerns() {
        let mut store = memory_store();
        assert!(check_schema_version(&mut store, "1.0.0"));
        assert_eq!(store.get(VERSION_STAMP_KEY).as_deref(), Some("1.0.0"));
    }

    #[test]
    fn matching_stamp_is_a_no_op() {
        let mut store = memory_store();
        check_schema_version(&mut store, "1.0.0");
        store.set(KEY_AGENTS, r#"["a"]"#);

        assert!(!check_schema_version(&mut store, "1.0.0"));
        assert_eq!(store.get(KEY_AGENTS).as_deref(), Some(r#"["a"]"#));
    }

    #[test]
    fn version_bump_purges_every_key_and_alias() {
        let mut store = memory_store();
        check_schema_version(&mut store, "1.0.0");
        store.set(KEY_AGENTS, r#"["a"]"#);
        store.set(KEY_MESSAGE_HISTORIES, r#"{"a":[]}"#);
        store.set(KEY_SETTINGS, "{}");

        assert!(check_schema_version(&mut store, "2.0.0"));

        for key in LOGICAL_KEYS {
            assert_eq!(store.get(key), None, "{key} survived the purge");
            for name in physical_names(key) {
                let tier = &store.tiers()[0];
                assert_eq!(tier.get(&name).expect("get"), None, "{name} survived");
            }
        }
        assert_eq!(store.get(VERSION_STAMP_KEY).as_deref(), Some("2.0.0"));
    }

    #[test]
    fn legacy_keys_are_purged_too() {
        let mut store = memory_store();
        check_schema_version(&mut store, "1.0.0");
        store.set("apiConfig", "{}");

        check_schema_version(&mut store, "2.0.0");
        assert_eq!(store.get("apiConfig"), None);
    }
}
