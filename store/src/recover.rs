//! Recovery scanner: find the most complete prior value of a logical key.
//!
//! A partially failed write can leave a value only under an alias, or only
//! on a lower tier. The scanner walks every tier in rank order and every
//! known alias within it, accepting the first candidate that parses as the
//! expected type and actually carries data.
//!
//! Recovery never writes. A caller that wants the recovered value persisted
//! must call `set` explicitly afterward - that separation keeps recovery
//! from destroying a still-good primary copy when the recovered value turns
//! out to be stale.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::durable::{DurableStore, physical_names};

/// Emptiness check for recovered candidates.
///
/// A candidate that parses but carries no data (an empty roster, an empty
/// ledger) is skipped: an empty value is indistinguishable from the default
/// state and recovering it would mask a better copy further down the scan.
pub trait RecoverTarget {
    fn has_content(&self) -> bool;
}

impl<T> RecoverTarget for Vec<T> {
    fn has_content(&self) -> bool {
        !self.is_empty()
    }
}

impl<K, V> RecoverTarget for BTreeMap<K, V> {
    fn has_content(&self) -> bool {
        !self.is_empty()
    }
}

impl<K, V> RecoverTarget for HashMap<K, V> {
    fn has_content(&self) -> bool {
        !self.is_empty()
    }
}

impl RecoverTarget for String {
    fn has_content(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl RecoverTarget for serde_json::Value {
    fn has_content(&self) -> bool {
        match self {
            serde_json::Value::Null => false,
            serde_json::Value::String(s) => !s.trim().is_empty(),
            serde_json::Value::Array(items) => !items.is_empty(),
            serde_json::Value::Object(fields) => !fields.is_empty(),
            serde_json::Value::Bool(_) | serde_json::Value::Number(_) => true,
        }
    }
}

impl DurableStore {
    /// Scan every tier and alias for a usable prior value of `key`.
    ///
    /// Tiers that failed their probe are still scanned: a tier whose writes
    /// are broken can sometimes still serve reads, and a read attempt
    /// against a truly dead tier just errors and is skipped.
    #[must_use]
    pub fn recover<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + RecoverTarget,
    {
        for tier in self.tiers() {
            let rank = tier.rank();
            for name in physical_names(key) {
                let raw = match tier.get(&name) {
                    Ok(Some(raw)) => raw,
                    Ok(None) => continue,
                    Err(e) => {
                        debug!(alias = name.as_str(), tier = rank.label(), "skipping candidate: {e}");
                        continue;
                    }
                };
                match serde_json::from_str::<T>(&raw) {
                    Ok(candidate) if candidate.has_content() => {
                        info!(
                            key,
                            alias = name.as_str(),
                            tier = rank.label(),
                            "recovered prior value"
                        );
                        return Some(candidate);
                    }
                    Ok(_) => debug!(alias = name.as_str(), "candidate parsed but is empty"),
                    Err(e) => debug!(alias = name.as_str(), "candidate failed to parse: {e}"),
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::backup_alias;
    use crate::tier::{MemoryTier, StorageTier, TierRank};

    fn store_with_planted(
        plant: impl FnOnce(&mut MemoryTier),
    ) -> DurableStore {
        let mut seeded = MemoryTier::new();
        plant(&mut seeded);
        DurableStore::new(vec![Box::new(seeded)])
    }

    #[test]
    fn backup_alias_candidate_is_found_but_get_ignores_it() {
        let store = store_with_planted(|tier| {
            tier.set(&backup_alias("agents"), r#"["only copy"]"#)
                .expect("plant");
        });

        assert_eq!(store.get("agents"), None);
        let recovered: Vec<String> = store.recover("agents").expect("recover");
        assert_eq!(recovered, vec!["only copy".to_owned()]);
    }

    #[test]
    fn empty_candidates_are_skipped_for_fuller_ones() {
        let store = store_with_planted(|tier| {
            tier.set("agents", "[]").expect("plant");
            tier.set(&backup_alias("agents"), r#"["a","b"]"#)
                .expect("plant");
        });

        let recovered: Vec<String> = store.recover("agents").expect("recover");
        assert_eq!(recovered.len(), 2);
    }

    #[test]
    fn malformed_candidates_are_skipped() {
        let store = store_with_planted(|tier| {
            tier.set("agents", "{not json").expect("plant");
            tier.set(&backup_alias("agents"), r#"["good"]"#).expect("plant");
        });

        let recovered: Vec<String> = store.recover("agents").expect("recover");
        assert_eq!(recovered, vec!["good".to_owned()]);
    }

    #[test]
    fn recovery_never_writes() {
        let store = store_with_planted(|tier| {
            tier.set(&backup_alias("agents"), r#"["x"]"#).expect("plant");
        });

        let _recovered: Option<Vec<String>> = store.recover("agents");
        assert_eq!(store.get("agents"), None, "recover must not re-commit");
    }

    #[test]
    fn nothing_to_recover_is_none() {
        let store = store_with_planted(|_| {});
        let recovered: Option<Vec<String>> = store.recover("agents");
        assert!(recovered.is_none());
    }
}
