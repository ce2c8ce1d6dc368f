//! Platform capability tiers.
//!
//! Which statistics API and which path-resolution strategy are valid depends
//! on the platform version. The tier is chosen once by whoever builds the
//! [`crate::volume::ExternalVolumeInfo`] and injected, so nothing in this
//! crate reads the platform version from ambient global state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// API level that introduced 64-bit statistics counters.
pub const API_LEVEL_STATFS_64: u32 = 18;

/// API level that introduced per-application external storage directory lists.
pub const API_LEVEL_MULTI_DIRECTORY: u32 = 19;

/// Platform capability tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityTier {
    /// Only 32-bit statistics counters; path resolved from the mount table.
    Legacy,
    /// 64-bit statistics counters; path resolved from the mount table.
    #[default]
    Modern,
    /// 64-bit statistics counters; path resolved from the platform's
    /// external storage directory list.
    MultiDirectory,
}

/// Which statistics counters to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsStrategy {
    /// 32-bit block counters, widened before multiplication.
    Legacy32,
    /// 64-bit block counters.
    Modern64,
}

/// Where the external volume path comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Classify the kernel mount table.
    MountTable,
    /// Take the second entry of the platform directory list.
    DirectoryList,
}

impl CapabilityTier {
    /// Maps an Android-style API level to a tier.
    pub fn from_api_level(level: u32) -> Self {
        if level >= API_LEVEL_MULTI_DIRECTORY {
            Self::MultiDirectory
        } else if level >= API_LEVEL_STATFS_64 {
            Self::Modern
        } else {
            Self::Legacy
        }
    }

    /// Parses an API level string such as `"19"`.
    pub fn parse_api_level(value: &str) -> Result<Self> {
        value
            .trim()
            .parse::<u32>()
            .map(Self::from_api_level)
            .map_err(|_| Error::InvalidApiLevel {
                value: value.to_string(),
            })
    }

    pub fn stats_strategy(&self) -> StatsStrategy {
        match self {
            Self::Legacy => StatsStrategy::Legacy32,
            Self::Modern | Self::MultiDirectory => StatsStrategy::Modern64,
        }
    }

    pub fn resolution_strategy(&self) -> ResolutionStrategy {
        match self {
            Self::Legacy | Self::Modern => ResolutionStrategy::MountTable,
            Self::MultiDirectory => ResolutionStrategy::DirectoryList,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Modern => "modern",
            Self::MultiDirectory => "multi-directory",
        }
    }
}

impl fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "modern" => Ok(Self::Modern),
            "multi-directory" | "multi_directory" | "multidirectory" => Ok(Self::MultiDirectory),
            _ => Err(Error::InvalidTier {
                value: s.to_string(),
            }),
        }
    }
}
