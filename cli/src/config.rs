//! CLI configuration: tier roots, quota, device class.
//!
//! Loaded from `haven.toml` in the platform config directory when present;
//! every field has a default, so the binary runs with no config file at all.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use haven_store::DeviceClass;

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    primary_dir: Option<PathBuf>,
    secondary_dir: Option<PathBuf>,
    /// Byte cap applied to the primary tier root.
    quota_bytes: Option<u64>,
    /// "workstation" (default) or "handheld".
    device: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HavenConfig {
    pub primary_dir: PathBuf,
    pub secondary_dir: PathBuf,
    pub quota_bytes: Option<u64>,
    pub device: DeviceClass,
}

impl HavenConfig {
    /// Load from the given path, or from the default location, or fall back
    /// to defaults when no file exists.
    pub fn load(explicit: Option<&PathBuf>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.clone()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let raw = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config at {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("failed to parse config at {}", path.display()))?
            }
            None => RawConfig::default(),
        };

        Self::resolve(raw)
    }

    fn resolve(raw: RawConfig) -> Result<Self> {
        let primary_dir = match raw.primary_dir {
            Some(dir) => dir,
            None => default_data_dir()?.join("primary"),
        };
        let secondary_dir = match raw.secondary_dir {
            Some(dir) => dir,
            None => default_cache_dir()?.join("secondary"),
        };

        let device = match raw.device.as_deref() {
            None | Some("workstation") => DeviceClass::Workstation,
            Some("handheld") => DeviceClass::Handheld,
            Some(other) => anyhow::bail!("unknown device class {other:?}"),
        };

        Ok(Self {
            primary_dir,
            secondary_dir,
            quota_bytes: raw.quota_bytes,
            device,
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("haven").join("haven.toml"))
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("haven"))
        .context("no platform data directory")
}

fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("haven"))
        .context("no platform cache directory")
}
