//! Probe configuration.
//!
//! Configuration is a JSON file; every field is optional and falls back to
//! its default:
//!
//! ```json
//! {
//!   "mount_table": "/proc/mounts",
//!   "tier": "multi-directory",
//!   "external_dirs": ["/storage/emulated/0", "/storage/external_SD"],
//!   "storage_root": "/storage",
//!   "app_subdir": "Android/data/com.example/files",
//!   "verify_mount_candidate": true
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::capability::CapabilityTier;
use crate::error::{ConfigParseSnafu, IoResultExt, Result};
use crate::mounts::PROC_MOUNTS_PATH;
use crate::storage_dirs::STORAGE_ROOT;

/// Application name used for the config directory.
pub const APP_NAME: &str = "extsd";

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Mount table pseudo-file.
    pub mount_table: PathBuf,
    /// Platform capability tier.
    pub tier: CapabilityTier,
    /// Explicit platform directory list, primary storage first. When empty,
    /// the list is enumerated from `storage_root`.
    pub external_dirs: Vec<PathBuf>,
    pub storage_root: PathBuf,
    /// Application subdirectory appended to each volume found under
    /// `storage_root`, e.g. `Android/data/com.example/files`.
    pub app_subdir: Option<PathBuf>,
    /// Require a mount table candidate to pass the write probe.
    pub verify_mount_candidate: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            mount_table: PathBuf::from(PROC_MOUNTS_PATH),
            tier: CapabilityTier::default(),
            external_dirs: Vec::new(),
            storage_root: PathBuf::from(STORAGE_ROOT),
            app_subdir: None,
            verify_mount_candidate: true,
        }
    }
}

impl ProbeConfig {
    /// Returns the default config file location, e.g. `~/.config/extsd/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).config_read_context(path)?;
        serde_json::from_str(&contents).context(ConfigParseSnafu { path })
    }

    /// Loads the config file at the default location, or the defaults if
    /// there is none.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => {
                log::debug!("loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
