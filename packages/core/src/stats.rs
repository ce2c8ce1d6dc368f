//! Filesystem block statistics.
//!
//! Two generations of the statistics API exist. The legacy one reports
//! 32-bit block counters, the modern one 64-bit counters. Both are turned
//! into byte counts the same way:
//!
//! ```text
//! total     = blocks           * block_size
//! free      = blocks_free      * block_size
//! available = blocks_available * block_size
//! ```
//!
//! `available` excludes blocks reserved for the superuser, so it is usually
//! smaller than `free`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use snafu::ResultExt;

use crate::capability::StatsStrategy;
use crate::error::{Result, StatisticsSnafu};

/// Block counters as reported by the 64-bit statistics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockCounters64 {
    pub block_size: u64,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
}

/// Block counters as reported by the legacy 32-bit statistics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockCounters32 {
    pub block_size: u32,
    pub blocks: u32,
    pub blocks_free: u32,
    pub blocks_available: u32,
}

impl From<BlockCounters32> for BlockCounters64 {
    fn from(c: BlockCounters32) -> Self {
        Self {
            block_size: u64::from(c.block_size),
            blocks: u64::from(c.blocks),
            blocks_free: u64::from(c.blocks_free),
            blocks_available: u64::from(c.blocks_available),
        }
    }
}

/// Platform statistics query surface.
pub trait StatFs {
    /// Queries 64-bit block counters for the filesystem containing `path`.
    fn counters_64(&self, path: &Path) -> Result<BlockCounters64>;

    /// Queries 32-bit block counters for the filesystem containing `path`.
    fn counters_32(&self, path: &Path) -> Result<BlockCounters32>;
}

/// `statvfs(3)` backed statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NixStatFs;

impl StatFs for NixStatFs {
    fn counters_64(&self, path: &Path) -> Result<BlockCounters64> {
        use nix::sys::statvfs::statvfs;

        let stat = statvfs(path).context(StatisticsSnafu { path })?;

        // f_blocks is counted in fragment-size units
        let fragment_size = stat.fragment_size() as u64;
        let block_size = if fragment_size > 0 {
            fragment_size
        } else {
            stat.block_size() as u64
        };

        Ok(BlockCounters64 {
            block_size,
            blocks: stat.blocks() as u64,
            blocks_free: stat.blocks_free() as u64,
            blocks_available: stat.blocks_available() as u64,
        })
    }

    fn counters_32(&self, path: &Path) -> Result<BlockCounters32> {
        let c = self.counters_64(path)?;
        Ok(BlockCounters32 {
            block_size: saturate_u32(c.block_size),
            blocks: saturate_u32(c.blocks),
            blocks_free: saturate_u32(c.blocks_free),
            blocks_available: saturate_u32(c.blocks_available),
        })
    }
}

fn saturate_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Snapshot of a filesystem's block allocation, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSystemBlockInfo {
    /// The path the statistics were requested for.
    pub path: PathBuf,
    pub block_size_bytes: u64,
    pub total_size_bytes: u64,
    /// Bytes available to unprivileged users.
    pub available_size_bytes: u64,
    /// Bytes free, including reserved blocks.
    pub free_size_bytes: u64,
}

impl FileSystemBlockInfo {
    /// Converts raw block counters into byte counts.
    pub fn from_counters(path: impl Into<PathBuf>, counters: BlockCounters64) -> Self {
        let bytes = |blocks: u64| blocks.saturating_mul(counters.block_size);
        Self {
            path: path.into(),
            block_size_bytes: counters.block_size,
            total_size_bytes: bytes(counters.blocks),
            available_size_bytes: bytes(counters.blocks_available),
            free_size_bytes: bytes(counters.blocks_free),
        }
    }

    pub fn used_size_bytes(&self) -> u64 {
        self.total_size_bytes.saturating_sub(self.free_size_bytes)
    }
}

/// Queries block statistics for `path` using the given strategy.
///
/// A failed query is an error, never a zero-filled result.
pub fn block_info(
    stat: &dyn StatFs,
    path: &Path,
    strategy: StatsStrategy,
) -> Result<FileSystemBlockInfo> {
    let counters = match strategy {
        StatsStrategy::Modern64 => stat.counters_64(path)?,
        // widen before multiplying so large volumes don't wrap
        StatsStrategy::Legacy32 => BlockCounters64::from(stat.counters_32(path)?),
    };
    log::debug!("block counters for {}: {:?}", path.display(), counters);

    Ok(FileSystemBlockInfo::from_counters(path, counters))
}
