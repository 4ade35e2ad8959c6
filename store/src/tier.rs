//! The storage tier capability interface.
//!
//! A tier is one ranked backend exposing `get`/`set`/`remove` over string
//! keys and values. Tiers are iterated uniformly by the durable store;
//! adding a tier means adding a list entry, not new branching.

use std::collections::HashMap;

use thiserror::Error;

/// Rank of a storage tier, most durable first.
///
/// The durable store tries tiers in this order and expects its tier list to
/// be sorted by rank, ending with a memory tier that cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TierRank {
    Primary,
    Secondary,
    Memory,
}

impl TierRank {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TierRank::Primary => "primary",
            TierRank::Secondary => "secondary",
            TierRank::Memory => "memory",
        }
    }
}

impl std::fmt::Display for TierRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure of a single tier operation.
///
/// `QuotaExceeded` is distinguished because it triggers the store's
/// eviction-then-single-retry path; everything else downgrades to the next
/// tier.
#[derive(Debug, Error)]
pub enum TierError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("tier unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TierError {
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, TierError::QuotaExceeded)
    }
}

/// One ranked storage backend.
///
/// Contract: a key is fully present or fully absent; there are no
/// partial-key semantics. Every operation returns promptly - a tier that
/// cannot answer fails with an error rather than blocking.
pub trait StorageTier {
    fn rank(&self) -> TierRank;

    fn get(&self, key: &str) -> Result<Option<String>, TierError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), TierError>;

    /// Returns whether the key was present.
    fn remove(&mut self, key: &str) -> Result<bool, TierError>;
}

/// The universal last resort: process-memory storage.
///
/// Bounded only by process memory; by contract it never fails, which is what
/// makes the store's "memory always succeeds" fallthrough sound.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: HashMap<String, String>,
}

impl MemoryTier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageTier for MemoryTier {
    fn rank(&self) -> TierRank {
        TierRank::Memory
    }

    fn get(&self, key: &str) -> Result<Option<String>, TierError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), TierError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, TierError> {
        Ok(self.entries.remove(key).is_some())
    }
}
