//! File-backed storage tier.
//!
//! One file per key under a root directory, written with a temp file +
//! rename so a crash mid-write never leaves a torn value. An optional byte
//! quota models the bounded storage of the host environment; exceeding it
//! fails with `TierError::QuotaExceeded` so the store can run its eviction
//! path.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::tier::{StorageTier, TierError, TierRank};

#[derive(Debug)]
pub struct FileTier {
    rank: TierRank,
    root: PathBuf,
    quota_bytes: Option<u64>,
}

impl FileTier {
    #[must_use]
    pub fn new(rank: TierRank, root: impl Into<PathBuf>) -> Self {
        Self {
            rank,
            root: root.into(),
            quota_bytes: None,
        }
    }

    /// Cap the total bytes stored under this tier's root.
    #[must_use]
    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }

    /// Total bytes currently stored, by scanning the root.
    ///
    /// Entry counts are small (one file per logical key or alias), so a scan
    /// per write is acceptable.
    fn usage_bytes(&self) -> Result<u64, TierError> {
        let mut total = 0;
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }

    fn check_quota(&self, key: &str, incoming_len: u64) -> Result<(), TierError> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let current = self.usage_bytes()?;
        let existing = std::fs::metadata(self.entry_path(key))
            .map(|m| m.len())
            .unwrap_or(0);
        if current - existing + incoming_len > quota {
            return Err(TierError::QuotaExceeded);
        }
        Ok(())
    }
}

impl StorageTier for FileTier {
    fn rank(&self) -> TierRank {
        self.rank
    }

    fn get(&self, key: &str) -> Result<Option<String>, TierError> {
        match std::fs::read_to_string(self.entry_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), TierError> {
        std::fs::create_dir_all(&self.root)?;
        self.check_quota(key, value.len() as u64)?;
        atomic_write(&self.root, &self.entry_path(key), value.as_bytes())?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, TierError> {
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Temp file + rename in the same directory.
fn atomic_write(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Encode a key into a safe file name.
///
/// Logical keys and aliases are plain identifiers, but encode defensively so
/// a hostile key cannot traverse out of the root.
fn encode_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' | b'.' => {
                name.push(byte as char);
            }
            other => {
                name.push('%');
                name.push_str(&format!("{other:02x}"));
            }
        }
    }
    // A bare "." or ".." must not resolve to a directory entry.
    if name == "." || name == ".." {
        return name.replace('.', "%2e");
    }
    name
}
