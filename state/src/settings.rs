//! Settings persistence.
//!
//! Settings are low-priority: the store evicts them first under quota
//! pressure, so absence is an expected state and always maps to defaults.

use tracing::warn;

use haven_store::{DurableStore, KEY_SETTINGS};
use haven_types::Settings;

/// Load settings, falling back to defaults on absence or parse failure.
#[must_use]
pub fn load_settings(store: &DurableStore) -> Settings {
    match store.get(KEY_SETTINGS) {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("stored settings did not parse, using defaults: {e}");
                Settings::default()
            }
        },
        None => Settings::default(),
    }
}

pub fn save_settings(store: &mut DurableStore, settings: &Settings) -> bool {
    match serde_json::to_string(settings) {
        Ok(payload) => store.set(KEY_SETTINGS, &payload),
        Err(e) => {
            warn!("settings serialization failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_store::MemoryTier;

    fn memory_store() -> DurableStore {
        DurableStore::new(vec![Box::new(MemoryTier::new())])
    }

    #[test]
    fn absent_settings_are_defaults() {
        let store = memory_store();
        assert_eq!(load_settings(&store), Settings::default());
    }

    #[test]
    fn round_trip() {
        let mut store = memory_store();
        let settings = Settings {
            model: "large".to_owned(),
            max_context_messages: 25,
            ..Settings::default()
        };

        assert!(save_settings(&mut store, &settings));
        assert_eq!(load_settings(&store), settings);
    }

    #[test]
    fn garbage_settings_fall_back_to_defaults() {
        let mut store = memory_store();
        store.set(KEY_SETTINGS, "not even close");
        assert_eq!(load_settings(&store), Settings::default());
    }
}
