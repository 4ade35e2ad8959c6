//! The durable key-value store facade.
//!
//! Writes go to the highest-ranked available tier and are read back and
//! byte-compared before the call reports success - the host's storage
//! primitive can accept a write without error yet fail to persist it, and
//! treating "no exception" as "success" is exactly the failure mode this
//! component exists to avoid. On failure the write falls through tier by
//! tier down to process memory.
//!
//! The store is the sole owner of physical alias naming:
//!
//! - `<key>`               primary copy
//! - `<key>_backup`        same-tier backup (high-value keys)
//! - `backup_<key>`        cross-tier mirror on the next-ranked tier
//! - `<key>_backup_mobile` extra mirror on handheld device classes

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use haven_types::ChatEntry;

use crate::notify::{StoreNotice, StoreNotifier};
use crate::probe::{CapabilitySet, probe};
use crate::tier::{StorageTier, TierError, TierRank};

/// Logical key of the persisted agent roster.
pub const KEY_AGENTS: &str = "agents";
/// Logical key of the persisted conversation ledger.
pub const KEY_MESSAGE_HISTORIES: &str = "messageHistories";
/// Logical key of the persisted user settings.
pub const KEY_SETTINGS: &str = "settings";

/// Keys deleted first when a write hits a quota limit.
pub const LOW_PRIORITY_KEYS: &[&str] = &[KEY_SETTINGS];

/// Per-agent entries retained when histories are truncated under quota
/// pressure. Deliberately tighter than the ledger's steady-state cap of 50;
/// the two constants are independent and must not be unified.
pub const EVICTION_RETAINED_PER_AGENT: usize = 20;

/// Redundancy configuration for one logical key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyPolicy {
    /// Write a same-tier `<key>_backup` copy after every successful set.
    pub backup: bool,
    /// On handheld devices, also write `<key>_backup_mobile` mirrors.
    pub device_mirror: bool,
}

impl KeyPolicy {
    /// Full redundancy: backup plus device mirror.
    #[must_use]
    pub fn high_value() -> Self {
        Self {
            backup: true,
            device_mirror: true,
        }
    }
}

/// Coarse device classification driving the extra mirror alias.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceClass {
    #[default]
    Workstation,
    /// Storage on handhelds is evicted aggressively by the host, so flagged
    /// keys get an extra mirror per tier.
    Handheld,
}

#[derive(Debug, Error)]
enum WriteFailure {
    #[error(transparent)]
    Tier(TierError),
    #[error("read-back did not match the written value")]
    VerifyMismatch,
}

impl WriteFailure {
    fn is_quota(&self) -> bool {
        matches!(self, WriteFailure::Tier(e) if e.is_quota())
    }
}

/// Tiered key-value store with write verification and graceful degradation.
pub struct DurableStore {
    tiers: Vec<Box<dyn StorageTier>>,
    caps: CapabilitySet,
    policies: HashMap<String, KeyPolicy>,
    device: DeviceClass,
    notifier: Option<Box<dyn StoreNotifier>>,
    degraded_notified: bool,
    last_verified_save: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore")
            .field("tiers", &self.tiers.len())
            .field("caps", &self.caps)
            .field("device", &self.device)
            .field("last_verified_save", &self.last_verified_save)
            .finish_non_exhaustive()
    }
}

impl DurableStore {
    /// Build a store over a tier stack, probing each tier once.
    ///
    /// `tiers` must be sorted by rank and end with a memory tier; the probe
    /// result is cached for the lifetime of the store.
    #[must_use]
    pub fn new(tiers: Vec<Box<dyn StorageTier>>) -> Self {
        let mut tiers = tiers;
        let caps = probe(&mut tiers);

        let mut policies = HashMap::new();
        policies.insert(KEY_AGENTS.to_owned(), KeyPolicy::high_value());

        Self {
            tiers,
            caps,
            policies,
            device: DeviceClass::default(),
            notifier: None,
            degraded_notified: false,
            last_verified_save: None,
        }
    }

    /// Attach the user-facing notice collaborator.
    ///
    /// If probing already concluded memory-only operation, the one-time
    /// degraded-mode notice fires immediately.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn StoreNotifier>) -> Self {
        self.notifier = Some(notifier);
        self.notify_degraded_once();
        self
    }

    #[must_use]
    pub fn with_device_class(mut self, device: DeviceClass) -> Self {
        self.device = device;
        self
    }

    /// Override the redundancy policy for one logical key.
    #[must_use]
    pub fn with_key_policy(mut self, key: impl Into<String>, policy: KeyPolicy) -> Self {
        self.policies.insert(key.into(), policy);
        self
    }

    #[must_use]
    pub fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    /// True unless the store is running in memory-only mode.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.caps.is_durable()
    }

    /// Timestamp of the most recent verified write, if any.
    #[must_use]
    pub fn last_verified_save(&self) -> Option<DateTime<Utc>> {
        self.last_verified_save
    }

    /// Read a logical key, trying tiers in rank order.
    ///
    /// Non-primary tiers are also checked under the cross-tier mirror alias
    /// before giving up. Absent is a valid, non-error result; no timestamps
    /// are compared across tiers - first hit wins.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        for tier in &self.tiers {
            let rank = tier.rank();
            if !self.caps.tier_available(rank) {
                continue;
            }
            match tier.get(key) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => {
                    warn!(key, tier = rank.label(), "read failed: {e}");
                    continue;
                }
            }
            if rank != TierRank::Primary {
                match tier.get(&mirror_alias(key)) {
                    Ok(Some(value)) => return Some(value),
                    Ok(None) => {}
                    Err(e) => warn!(key, tier = rank.label(), "mirror read failed: {e}"),
                }
            }
        }
        None
    }

    /// Write a logical key with verification and tier fallback.
    ///
    /// Returns false only if every tier, including memory, rejected the
    /// write. Quota exhaustion triggers eviction and a single retry on the
    /// same tier before falling through.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let mut payload: Cow<'_, str> = Cow::Borrowed(value);
        let mut evicted = false;

        for idx in 0..self.tiers.len() {
            let rank = self.tiers[idx].rank();
            if !self.caps.tier_available(rank) {
                continue;
            }

            match self.write_verified(idx, key, &payload) {
                Ok(()) => {
                    self.finish_write(idx, key, &payload);
                    return true;
                }
                Err(failure) if failure.is_quota() && !evicted => {
                    evicted = true;
                    info!(key, tier = rank.label(), "quota exceeded, evicting");
                    payload = Cow::Owned(self.relieve_pressure(key, &payload));
                    match self.write_verified(idx, key, &payload) {
                        Ok(()) => {
                            self.finish_write(idx, key, &payload);
                            return true;
                        }
                        Err(retry_failure) => {
                            warn!(
                                key,
                                tier = rank.label(),
                                "write still failing after eviction: {retry_failure}"
                            );
                        }
                    }
                }
                Err(failure) => {
                    warn!(key, tier = rank.label(), "write failed: {failure}");
                }
            }
        }

        // Unreachable with a conforming memory tier at the end of the stack,
        // but resource exhaustion must reach the caller, not be swallowed.
        warn!(key, "every tier rejected the write");
        false
    }

    /// Remove a logical key and all of its aliases from every available
    /// tier. Returns true if at least one removal occurred.
    pub fn remove(&mut self, key: &str) -> bool {
        let names = physical_names(key);
        let caps = self.caps;
        let mut removed = false;

        for tier in &mut self.tiers {
            let rank = tier.rank();
            if !caps.tier_available(rank) {
                continue;
            }
            for name in &names {
                match tier.remove(name) {
                    Ok(true) => removed = true,
                    Ok(false) => {}
                    Err(e) => warn!(key = name.as_str(), tier = rank.label(), "remove failed: {e}"),
                }
            }
        }

        removed
    }

    /// Delete the fixed list of low-priority logical keys.
    ///
    /// Called when a write hits a quota limit; also available to callers
    /// that want to free space preemptively.
    pub fn evict_low_priority(&mut self) {
        for key in LOW_PRIORITY_KEYS {
            let removed = self.remove(key);
            info!(key, removed, "low-priority key evicted");
        }
    }

    pub(crate) fn tiers(&self) -> &[Box<dyn StorageTier>] {
        &self.tiers
    }

    fn write_verified(&mut self, idx: usize, key: &str, value: &str) -> Result<(), WriteFailure> {
        self.tiers[idx]
            .set(key, value)
            .map_err(WriteFailure::Tier)?;

        // Verified, not assumed: a tier that silently truncates or rejects
        // the write is a failure even though no error was raised.
        match self.tiers[idx].get(key) {
            Ok(Some(read_back)) if read_back == value => Ok(()),
            Ok(_) => {
                // Drop the residue so later reads cannot serve a corrupt
                // copy in preference to a verified one on a lower tier.
                if let Err(e) = self.tiers[idx].remove(key) {
                    debug!(key, "failed to clear unverified write: {e}");
                }
                Err(WriteFailure::VerifyMismatch)
            }
            Err(e) => Err(WriteFailure::Tier(e)),
        }
    }

    /// Post-write redundancy: same-tier backup, cross-tier mirror, device
    /// mirrors. All best-effort; failures are logged and discarded, never
    /// propagated into the call's result.
    fn finish_write(&mut self, idx: usize, key: &str, value: &str) {
        self.last_verified_save = Some(Utc::now());
        let policy = self.policies.get(key).copied().unwrap_or_default();

        if policy.backup
            && let Err(e) = self.tiers[idx].set(&backup_alias(key), value)
        {
            debug!(key, "same-tier backup write failed: {e}");
        }

        if let Some(next) = self.next_available_tier(idx)
            && let Err(e) = self.tiers[next].set(&mirror_alias(key), value)
        {
            debug!(key, "cross-tier mirror write failed: {e}");
        }

        if policy.device_mirror && self.device == DeviceClass::Handheld {
            let caps = self.caps;
            for tier in &mut self.tiers {
                if !caps.tier_available(tier.rank()) {
                    continue;
                }
                if let Err(e) = tier.set(&device_alias(key), value) {
                    debug!(key, "device mirror write failed: {e}");
                }
            }
        }
    }

    fn next_available_tier(&self, after: usize) -> Option<usize> {
        self.tiers
            .iter()
            .enumerate()
            .skip(after + 1)
            .find(|(_, tier)| self.caps.tier_available(tier.rank()))
            .map(|(idx, _)| idx)
    }

    /// Free space for a failed write and shrink the in-flight value when it
    /// is the conversation ledger.
    fn relieve_pressure(&mut self, key: &str, value: &str) -> String {
        self.evict_low_priority();

        if key != KEY_MESSAGE_HISTORIES {
            return value.to_owned();
        }

        match serde_json::from_str::<BTreeMap<String, Vec<ChatEntry>>>(value) {
            Ok(mut histories) => {
                for entries in histories.values_mut() {
                    if entries.len() > EVICTION_RETAINED_PER_AGENT {
                        let excess = entries.len() - EVICTION_RETAINED_PER_AGENT;
                        entries.drain(..excess);
                    }
                }
                match serde_json::to_string(&histories) {
                    Ok(truncated) => truncated,
                    Err(e) => {
                        warn!("truncated ledger failed to re-serialize: {e}");
                        value.to_owned()
                    }
                }
            }
            Err(e) => {
                warn!("ledger truncation skipped, value did not parse: {e}");
                value.to_owned()
            }
        }
    }

    fn notify_degraded_once(&mut self) {
        if self.degraded_notified || !self.caps.memory_only() {
            return;
        }
        if let Some(notifier) = &self.notifier {
            notifier.notify(StoreNotice::DegradedMode);
            self.degraded_notified = true;
        }
    }
}

pub(crate) fn backup_alias(key: &str) -> String {
    format!("{key}_backup")
}

pub(crate) fn mirror_alias(key: &str) -> String {
    format!("backup_{key}")
}

pub(crate) fn device_alias(key: &str) -> String {
    format!("{key}_backup_mobile")
}

/// Every physical name a logical key may be stored under.
pub(crate) fn physical_names(key: &str) -> [String; 4] {
    [
        key.to_owned(),
        backup_alias(key),
        mirror_alias(key),
        device_alias(key),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::MemoryTier;

    /// Durable-looking tier with a byte budget across all entries.
    struct QuotaTier {
        rank: TierRank,
        entries: HashMap<String, String>,
        budget: usize,
    }

    impl QuotaTier {
        fn new(rank: TierRank, budget: usize) -> Self {
            Self {
                rank,
                entries: HashMap::new(),
                budget,
            }
        }

        fn used(&self) -> usize {
            self.entries.values().map(String::len).sum()
        }
    }

    impl StorageTier for QuotaTier {
        fn rank(&self) -> TierRank {
            self.rank
        }

        fn get(&self, key: &str) -> Result<Option<String>, TierError> {
            Ok(self.entries.get(key).cloned())
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), TierError> {
            let existing = self.entries.get(key).map_or(0, String::len);
            if self.used() - existing + value.len() > self.budget {
                return Err(TierError::QuotaExceeded);
            }
            self.entries.insert(key.to_owned(), value.to_owned());
            Ok(())
        }

        fn remove(&mut self, key: &str) -> Result<bool, TierError> {
            Ok(self.entries.remove(key).is_some())
        }
    }

    /// Accepts any write but stores a truncated value.
    struct TruncatingTier {
        entries: HashMap<String, String>,
    }

    impl StorageTier for TruncatingTier {
        fn rank(&self) -> TierRank {
            TierRank::Primary
        }

        fn get(&self, key: &str) -> Result<Option<String>, TierError> {
            Ok(self.entries.get(key).cloned())
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), TierError> {
            let truncated = value.chars().take(3).collect();
            self.entries.insert(key.to_owned(), truncated);
            Ok(())
        }

        fn remove(&mut self, key: &str) -> Result<bool, TierError> {
            Ok(self.entries.remove(key).is_some())
        }
    }

    fn plain_store() -> DurableStore {
        DurableStore::new(vec![
            Box::new(QuotaTier::new(TierRank::Primary, usize::MAX)),
            Box::new(QuotaTier::new(TierRank::Secondary, usize::MAX)),
            Box::new(MemoryTier::new()),
        ])
    }

    #[test]
    fn set_then_get_returns_identical_value() {
        let mut store = plain_store();
        assert!(store.set("settings", r#"{"model":"m"}"#));
        assert_eq!(store.get("settings").as_deref(), Some(r#"{"model":"m"}"#));
        assert!(store.last_verified_save().is_some());
    }

    #[test]
    fn absent_key_is_none_not_error() {
        let store = plain_store();
        assert_eq!(store.get("nothing_here"), None);
    }

    #[test]
    fn truncating_tier_fails_verification_and_falls_through() {
        let mut store = DurableStore::new(vec![
            Box::new(TruncatingTier {
                entries: HashMap::new(),
            }),
            Box::new(MemoryTier::new()),
        ]);
        // The truncating tier passes its probe ("1" survives truncation to
        // three chars), so the store believes the primary tier works.
        assert!(store.capabilities().primary_ok());

        assert!(store.set("agents", "a long value"));
        // Value must have landed in memory, not the truncating tier.
        assert_eq!(store.get("agents").as_deref(), Some("a long value"));
    }

    #[test]
    fn high_value_key_gets_same_tier_backup() {
        let mut store = plain_store();
        assert!(store.set(KEY_AGENTS, "[\"a\"]"));
        let primary = &store.tiers()[0];
        assert_eq!(
            primary.get(&backup_alias(KEY_AGENTS)).expect("get"),
            Some("[\"a\"]".to_owned())
        );
    }

    #[test]
    fn ordinary_key_gets_no_backup_alias() {
        let mut store = plain_store();
        assert!(store.set(KEY_SETTINGS, "{}"));
        let primary = &store.tiers()[0];
        assert_eq!(primary.get(&backup_alias(KEY_SETTINGS)).expect("get"), None);
    }

    #[test]
    fn mirror_lands_on_next_ranked_tier() {
        let mut store = plain_store();
        assert!(store.set("settings", "{}"));
        let secondary = &store.tiers()[1];
        assert_eq!(
            secondary.get(&mirror_alias("settings")).expect("get"),
            Some("{}".to_owned())
        );
    }

    #[test]
    fn device_mirror_only_on_handheld() {
        let mut store = plain_store();
        assert!(store.set(KEY_AGENTS, "[1]"));
        assert_eq!(
            store.tiers()[0]
                .get(&device_alias(KEY_AGENTS))
                .expect("get"),
            None
        );

        let mut handheld = plain_store().with_device_class(DeviceClass::Handheld);
        assert!(handheld.set(KEY_AGENTS, "[1]"));
        assert_eq!(
            handheld.tiers()[0]
                .get(&device_alias(KEY_AGENTS))
                .expect("get"),
            Some("[1]".to_owned())
        );
    }

    #[test]
    fn remove_clears_all_aliases_and_reports_presence() {
        let mut store = plain_store().with_device_class(DeviceClass::Handheld);
        assert!(store.set(KEY_AGENTS, "[1]"));
        assert!(store.remove(KEY_AGENTS));
        assert_eq!(store.get(KEY_AGENTS), None);
        for name in physical_names(KEY_AGENTS) {
            for tier in store.tiers() {
                assert_eq!(tier.get(&name).expect("get"), None, "alias {name} left behind");
            }
        }
        assert!(!store.remove(KEY_AGENTS), "second remove finds nothing");
    }

    #[test]
    fn quota_failure_evicts_then_retries_once() {
        let history = serde_json::json!({
            "a1": (0..30)
                .map(|i| serde_json::json!({"role": "user", "content": format!("msg {i}")}))
                .collect::<Vec<_>>()
        })
        .to_string();

        // Budget fits a truncated (20-entry) history once the settings value
        // is evicted, but neither the full 30-entry history alongside the
        // settings value nor the untruncated history alone.
        let settings_payload = "x".repeat(600);
        let budget = 800;
        assert!(settings_payload.len() <= budget);
        assert!(history.len() > budget);

        let mut store = DurableStore::new(vec![
            Box::new(QuotaTier::new(TierRank::Primary, budget)),
            Box::new(MemoryTier::new()),
        ]);
        assert!(store.set(KEY_SETTINGS, &settings_payload));

        assert!(store.set(KEY_MESSAGE_HISTORIES, &history));

        // Low-priority key purged.
        assert_eq!(store.get(KEY_SETTINGS), None);

        // Retried write landed on the durable tier, truncated to 20 entries.
        let stored = store.tiers()[0]
            .get(KEY_MESSAGE_HISTORIES)
            .expect("get")
            .expect("history present on primary tier");
        let parsed: BTreeMap<String, Vec<ChatEntry>> =
            serde_json::from_str(&stored).expect("parse");
        assert_eq!(parsed["a1"].len(), EVICTION_RETAINED_PER_AGENT);
        assert_eq!(parsed["a1"][0].content, "msg 10");
        assert_eq!(parsed["a1"][19].content, "msg 29");
    }

    #[test]
    fn quota_failure_falls_through_to_memory_when_eviction_is_not_enough() {
        let mut store = DurableStore::new(vec![
            Box::new(QuotaTier::new(TierRank::Primary, 4)),
            Box::new(MemoryTier::new()),
        ]);
        let oversized = "more than four bytes";
        assert!(store.set("settings", oversized));
        assert_eq!(store.get("settings").as_deref(), Some(oversized));
        assert_eq!(store.tiers()[0].get("settings").expect("get"), None);
    }

    #[test]
    fn set_returns_false_when_every_tier_rejects() {
        // No memory tier: a deliberately malformed stack to reach the
        // caller-visible failure path.
        let mut store = DurableStore::new(vec![Box::new(QuotaTier::new(TierRank::Primary, 0))]);
        assert!(!store.set("k", "v"));
    }

    #[test]
    fn skips_tiers_marked_unavailable_by_probe() {
        struct FailsProbeThenWorks {
            entries: HashMap<String, String>,
            writes: u32,
        }
        impl StorageTier for FailsProbeThenWorks {
            fn rank(&self) -> TierRank {
                TierRank::Primary
            }
            fn get(&self, key: &str) -> Result<Option<String>, TierError> {
                Ok(self.entries.get(key).cloned())
            }
            fn set(&mut self, key: &str, value: &str) -> Result<(), TierError> {
                self.writes += 1;
                if self.writes == 1 {
                    return Err(TierError::Unavailable("starting up".to_owned()));
                }
                self.entries.insert(key.to_owned(), value.to_owned());
                Ok(())
            }
            fn remove(&mut self, key: &str) -> Result<bool, TierError> {
                Ok(self.entries.remove(key).is_some())
            }
        }

        let mut store = DurableStore::new(vec![
            Box::new(FailsProbeThenWorks {
                entries: HashMap::new(),
                writes: 0,
            }),
            Box::new(MemoryTier::new()),
        ]);
        assert!(!store.capabilities().primary_ok());
        assert!(store.set("k", "v"));
        // The capability set is immutable: the flaky tier stays skipped even
        // though it would accept writes now.
        assert_eq!(store.tiers()[0].get("k").expect("get"), None);
    }
}
