//! Startup probe: which tiers actually work, not merely exist.
//!
//! A tier passes only if a sentinel value survives a write/read/remove cycle
//! byte-for-byte. Hosts have been observed to accept a write call without
//! error and then not persist it, so existence of the backend is never
//! trusted.

use tracing::{debug, warn};

use crate::tier::{StorageTier, TierRank};

const PROBE_KEY: &str = "_haven_probe";
const PROBE_VALUE: &str = "1";

/// The probed availability of each tier rank.
///
/// Computed once per process; read-only thereafter. The memory fallback is
/// universal, so at least one tier is always available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    primary_ok: bool,
    secondary_ok: bool,
    memory_fallback: bool,
}

impl CapabilitySet {
    #[must_use]
    pub fn tier_available(&self, rank: TierRank) -> bool {
        match rank {
            TierRank::Primary => self.primary_ok,
            TierRank::Secondary => self.secondary_ok,
            TierRank::Memory => true,
        }
    }

    /// False when only the memory fallback survived probing.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.primary_ok || self.secondary_ok
    }

    #[must_use]
    pub fn memory_only(&self) -> bool {
        self.memory_fallback
    }

    #[must_use]
    pub fn primary_ok(&self) -> bool {
        self.primary_ok
    }

    #[must_use]
    pub fn secondary_ok(&self) -> bool {
        self.secondary_ok
    }
}

/// Probe every tier once and cache the result.
///
/// Probing never panics and never propagates an error: any internal fault is
/// interpreted as "tier unavailable". The sentinel cycle is fully cleaned up
/// on every path.
pub fn probe(tiers: &mut [Box<dyn StorageTier>]) -> CapabilitySet {
    let mut primary_ok = false;
    let mut secondary_ok = false;

    for tier in tiers.iter_mut() {
        let rank = tier.rank();
        let passed = sentinel_cycle(tier.as_mut());
        debug!(tier = rank.label(), passed, "tier probe");
        match rank {
            TierRank::Primary => primary_ok = passed,
            TierRank::Secondary => secondary_ok = passed,
            TierRank::Memory => {
                if !passed {
                    // The memory tier cannot fail by contract; a failing probe
                    // here means a misbehaving custom tier implementation.
                    warn!("memory tier failed its probe cycle");
                }
            }
        }
    }

    let memory_fallback = !primary_ok && !secondary_ok;
    if memory_fallback {
        warn!("no durable tier available; storage degrades to process memory");
    }

    CapabilitySet {
        primary_ok,
        secondary_ok,
        memory_fallback,
    }
}

fn sentinel_cycle(tier: &mut dyn StorageTier) -> bool {
    if let Err(e) = tier.set(PROBE_KEY, PROBE_VALUE) {
        debug!(tier = tier.rank().label(), "probe write failed: {e}");
        return false;
    }

    let verified = matches!(tier.get(PROBE_KEY), Ok(Some(v)) if v == PROBE_VALUE);

    // Clean up the sentinel even when verification failed.
    if let Err(e) = tier.remove(PROBE_KEY) {
        debug!(tier = tier.rank().label(), "probe cleanup failed: {e}");
    }

    verified
}
