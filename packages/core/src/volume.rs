//! External volume information with memoized resolution.
//!
//! [`ExternalVolumeInfo`] composes the mount table reader, the classifier,
//! the write probe and the statistics query:
//!
//! - the volume path is resolved once, on first access;
//! - writability is probed once, on first access;
//! - block statistics are queried fresh on every call, since free space
//!   changes continuously.
//!
//! First-access initialisation goes through [`OnceLock`], so concurrent
//! callers share one resolution and one probe.
//!
//! No accessor returns an error. Failures are logged and surface as
//! [`Writability::NotWritable`] or [`BlockInfoState::Unavailable`].

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Serialize;

use crate::capability::{CapabilityTier, ResolutionStrategy};
use crate::classify;
use crate::config::ProbeConfig;
use crate::mounts::MountTableReader;
use crate::probe;
use crate::stats::{self, FileSystemBlockInfo, NixStatFs, StatFs};
use crate::storage_dirs::{
    self, FixedDirectories, StorageDirectories, StorageRootDirectories,
};

/// Outcome of the write probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Writability {
    /// No external volume was found, so nothing was probed.
    NoVolume,
    Writable,
    /// The probe failed; `reason` carries the error chain.
    NotWritable { reason: String },
}

impl Writability {
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Writable)
    }

    fn from_probe(path: &Path) -> Self {
        match probe::probe_write(path) {
            Ok(()) => Self::Writable,
            Err(e) => {
                let reason = e.report();
                log::warn!("write probe failed: {}", reason);
                Self::NotWritable { reason }
            }
        }
    }
}

/// Outcome of a block statistics query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BlockInfoState {
    /// No external volume was found.
    NoVolume,
    Available(FileSystemBlockInfo),
    /// The volume was resolved but the statistics query failed.
    Unavailable { reason: String },
}

impl BlockInfoState {
    pub fn info(&self) -> Option<&FileSystemBlockInfo> {
        match self {
            Self::Available(info) => Some(info),
            _ => None,
        }
    }

    pub fn into_info(self) -> Option<FileSystemBlockInfo> {
        match self {
            Self::Available(info) => Some(info),
            _ => None,
        }
    }
}

type SharedStatFs = Box<dyn StatFs + Send + Sync>;
type SharedDirectories = Box<dyn StorageDirectories + Send + Sync>;

/// Lazily resolved information about the external SD card.
pub struct ExternalVolumeInfo {
    tier: CapabilityTier,
    mount_table: MountTableReader,
    stat_fs: SharedStatFs,
    directories: SharedDirectories,
    verify_mount_candidate: bool,
    path: OnceLock<Option<PathBuf>>,
    writability: OnceLock<Writability>,
}

impl std::fmt::Debug for ExternalVolumeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalVolumeInfo")
            .field("tier", &self.tier)
            .field("mount_table", &self.mount_table)
            .field("verify_mount_candidate", &self.verify_mount_candidate)
            .field("path", &self.path.get())
            .field("writability", &self.writability.get())
            .finish_non_exhaustive()
    }
}

impl ExternalVolumeInfo {
    /// Creates an instance using the real platform collaborators:
    /// `/proc/mounts`, `statvfs(3)` and the `/storage` directory layout.
    pub fn new(tier: CapabilityTier) -> Self {
        Self {
            tier,
            mount_table: MountTableReader::default(),
            stat_fs: Box::new(NixStatFs),
            directories: Box::new(StorageRootDirectories::default()),
            verify_mount_candidate: true,
            path: OnceLock::new(),
            writability: OnceLock::new(),
        }
    }

    /// Creates an instance from a configuration.
    pub fn from_config(config: &ProbeConfig) -> Self {
        let directories: SharedDirectories = if config.external_dirs.is_empty() {
            let root = StorageRootDirectories::new(&config.storage_root);
            match &config.app_subdir {
                Some(subdir) => Box::new(root.with_app_subdir(subdir)),
                None => Box::new(root),
            }
        } else {
            Box::new(FixedDirectories(config.external_dirs.clone()))
        };

        Self {
            directories,
            ..Self::new(config.tier)
                .with_mount_table(MountTableReader::new(&config.mount_table))
                .with_verify_mount_candidate(config.verify_mount_candidate)
        }
    }

    pub fn with_mount_table(mut self, reader: MountTableReader) -> Self {
        self.mount_table = reader;
        self
    }

    pub fn with_stat_fs(mut self, stat_fs: impl StatFs + Send + Sync + 'static) -> Self {
        self.stat_fs = Box::new(stat_fs);
        self
    }

    pub fn with_directories(
        mut self,
        directories: impl StorageDirectories + Send + Sync + 'static,
    ) -> Self {
        self.directories = Box::new(directories);
        self
    }

    /// Whether a mount table candidate must pass the write probe to count
    /// as found. Defaults to true.
    pub fn with_verify_mount_candidate(mut self, verify: bool) -> Self {
        self.verify_mount_candidate = verify;
        self
    }

    pub fn tier(&self) -> CapabilityTier {
        self.tier
    }

    /// Returns true if an external volume was found.
    pub fn exists(&self) -> bool {
        self.path().is_some()
    }

    /// The resolved external volume path. Stable after the first call.
    pub fn path(&self) -> Option<&Path> {
        self.path.get_or_init(|| self.resolve()).as_deref()
    }

    /// Probe outcome for the resolved path, computed once.
    pub fn writability(&self) -> &Writability {
        let path = self.path();
        self.writability.get_or_init(|| match path {
            Some(path) => Writability::from_probe(path),
            None => Writability::NoVolume,
        })
    }

    pub fn is_writable(&self) -> bool {
        self.writability().is_writable()
    }

    /// Queries block statistics for the resolved path. Never cached.
    pub fn block_info_state(&self) -> BlockInfoState {
        let Some(path) = self.path() else {
            return BlockInfoState::NoVolume;
        };

        match stats::block_info(self.stat_fs.as_ref(), path, self.tier.stats_strategy()) {
            Ok(info) => BlockInfoState::Available(info),
            Err(e) => {
                let reason = e.report();
                log::warn!("block statistics unavailable: {}", reason);
                BlockInfoState::Unavailable { reason }
            }
        }
    }

    /// Fresh block statistics, or None if there is no volume or the query
    /// failed. Use [`Self::block_info_state`] to tell the two apart.
    pub fn block_info(&self) -> Option<FileSystemBlockInfo> {
        self.block_info_state().into_info()
    }

    /// The raw mount table text, empty if it cannot be read.
    pub fn mount_table(&self) -> String {
        self.mount_table.read()
    }

    fn resolve(&self) -> Option<PathBuf> {
        let path = match self.tier.resolution_strategy() {
            ResolutionStrategy::MountTable => self.resolve_from_mount_table(),
            ResolutionStrategy::DirectoryList => {
                storage_dirs::alternate_path(self.directories.as_ref())
            }
        };

        match &path {
            Some(path) => log::info!("external SD card resolved to {}", path.display()),
            None => log::info!("no external SD card found ({} tier)", self.tier),
        }
        path
    }

    fn resolve_from_mount_table(&self) -> Option<PathBuf> {
        let text = self.mount_table.read();
        let candidate = classify::classify(&text)?;

        if !self.verify_mount_candidate {
            return Some(candidate);
        }

        // The probe result doubles as the memoized writability.
        let writability = Writability::from_probe(&candidate);
        if writability.is_writable() {
            let _ = self.writability.set(writability);
            Some(candidate)
        } else {
            log::info!(
                "discarding {}: mounted but not writable",
                candidate.display()
            );
            let _ = self.writability.set(Writability::NoVolume);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::stats::{BlockCounters32, BlockCounters64};
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Reports fewer free blocks on every query.
    #[derive(Default)]
    struct ShrinkingStatFs {
        queries: AtomicU64,
    }

    impl StatFs for ShrinkingStatFs {
        fn counters_64(&self, _path: &Path) -> crate::Result<BlockCounters64> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(BlockCounters64 {
                block_size: 4096,
                blocks: 1000,
                blocks_free: 500 - n,
                blocks_available: 450 - n,
            })
        }

        fn counters_32(&self, path: &Path) -> crate::Result<BlockCounters32> {
            let c = self.counters_64(path)?;
            Ok(BlockCounters32 {
                block_size: c.block_size as u32,
                blocks: c.blocks as u32,
                blocks_free: c.blocks_free as u32,
                blocks_available: c.blocks_available as u32,
            })
        }
    }

    struct FailingStatFs;

    impl StatFs for FailingStatFs {
        fn counters_64(&self, path: &Path) -> crate::Result<BlockCounters64> {
            Err(Error::Statistics {
                path: path.to_path_buf(),
                source: nix::Error::ENOENT,
            })
        }

        fn counters_32(&self, path: &Path) -> crate::Result<BlockCounters32> {
            Err(Error::Statistics {
                path: path.to_path_buf(),
                source: nix::Error::ENOENT,
            })
        }
    }

    /// A fake `/storage/extSdCard` inside a temp dir, plus a mount table
    /// that points at it.
    struct FakeCard {
        _root: tempfile::TempDir,
        card: PathBuf,
        mounts: PathBuf,
    }

    fn fake_card() -> FakeCard {
        let root = tempfile::tempdir().unwrap();
        let card = root.path().join("storage/extSdCard");
        fs::create_dir_all(&card).unwrap();

        let mounts = root.path().join("mounts");
        fs::write(
            &mounts,
            format!(
                "/dev/block/vold/259:3 /storage/sdcard0 vfat rw 0 0\n\
                 /dev/block/vold/179:9 {} vfat rw,dirsync 0 0\n",
                card.display()
            ),
        )
        .unwrap();

        FakeCard {
            _root: root,
            card,
            mounts,
        }
    }

    #[test]
    fn test_mount_table_resolution_verified() {
        let fake = fake_card();
        let info = ExternalVolumeInfo::new(CapabilityTier::Modern)
            .with_mount_table(MountTableReader::new(&fake.mounts))
            .with_stat_fs(ShrinkingStatFs::default());

        assert!(info.exists());
        assert_eq!(info.path(), Some(fake.card.as_path()));
        assert_eq!(info.writability(), &Writability::Writable);
        assert!(info.is_writable());
        // No probe file left behind
        assert_eq!(fs::read_dir(&fake.card).unwrap().count(), 0);
    }

    #[test]
    fn test_unwritable_candidate_is_discarded() {
        let text = "/dev/block/vold/179:9 /storage/extSdCard-does-not-exist vfat rw 0 0\n";
        let mounts = tempfile::NamedTempFile::new().unwrap();
        fs::write(mounts.path(), text).unwrap();

        let info = ExternalVolumeInfo::new(CapabilityTier::Legacy)
            .with_mount_table(MountTableReader::new(mounts.path()));

        assert!(!info.exists());
        assert_eq!(info.path(), None);
        assert!(!info.is_writable());
        assert_eq!(info.block_info_state(), BlockInfoState::NoVolume);
    }

    #[test]
    fn test_unverified_candidate_kept_but_not_writable() {
        let text = "/dev/block/vold/179:9 /storage/extSdCard-does-not-exist vfat rw 0 0\n";
        let mounts = tempfile::NamedTempFile::new().unwrap();
        fs::write(mounts.path(), text).unwrap();

        let info = ExternalVolumeInfo::new(CapabilityTier::Modern)
            .with_mount_table(MountTableReader::new(mounts.path()))
            .with_verify_mount_candidate(false);

        assert_eq!(
            info.path(),
            Some(Path::new("/storage/extSdCard-does-not-exist"))
        );
        assert!(matches!(
            info.writability(),
            Writability::NotWritable { .. }
        ));
        assert!(matches!(
            info.block_info_state(),
            BlockInfoState::Unavailable { .. }
        ));
        assert_eq!(info.block_info(), None);
    }

    #[test]
    fn test_unreadable_mount_table_means_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let info = ExternalVolumeInfo::new(CapabilityTier::Modern)
            .with_mount_table(MountTableReader::new(dir.path().join("missing")));

        assert!(!info.exists());
        assert_eq!(info.writability(), &Writability::NoVolume);
        assert_eq!(info.mount_table(), "");
    }

    #[test]
    fn test_directory_list_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let info = ExternalVolumeInfo::new(CapabilityTier::MultiDirectory)
            .with_directories(FixedDirectories(vec![
                PathBuf::from("/storage/emulated/0"),
                dir.path().to_path_buf(),
            ]))
            .with_stat_fs(ShrinkingStatFs::default());

        assert_eq!(info.path(), Some(dir.path()));
        assert!(info.is_writable());
    }

    #[test]
    fn test_directory_list_never_uses_internal() {
        let dir = tempfile::tempdir().unwrap();
        let info = ExternalVolumeInfo::new(CapabilityTier::MultiDirectory)
            .with_directories(FixedDirectories(vec![dir.path().to_path_buf()]));

        assert!(!info.exists());
        assert!(!info.is_writable());
        assert_eq!(info.block_info(), None);
    }

    #[test]
    fn test_directory_tier_ignores_mount_table() {
        let fake = fake_card();
        let info = ExternalVolumeInfo::new(CapabilityTier::MultiDirectory)
            .with_mount_table(MountTableReader::new(&fake.mounts))
            .with_directories(FixedDirectories::default());

        assert!(!info.exists());
        // The raw table is still available for display.
        assert!(info.mount_table().contains("extSdCard"));
    }

    #[test]
    fn test_path_memoized_block_info_fresh() {
        let fake = fake_card();
        let info = ExternalVolumeInfo::new(CapabilityTier::Modern)
            .with_mount_table(MountTableReader::new(&fake.mounts))
            .with_stat_fs(ShrinkingStatFs::default());

        let first_path = info.path().map(Path::to_path_buf);
        // Remount elsewhere: the memoized path must not change.
        fs::write(&fake.mounts, "").unwrap();
        assert_eq!(info.path().map(Path::to_path_buf), first_path);

        let first = info.block_info().unwrap();
        let second = info.block_info().unwrap();
        assert_eq!(first.free_size_bytes, 500 * 4096);
        assert_eq!(second.free_size_bytes, 499 * 4096);
        assert!(second.available_size_bytes <= second.free_size_bytes);
    }

    #[test]
    fn test_legacy_tier_uses_32_bit_counters() {
        let fake = fake_card();
        let info = ExternalVolumeInfo::new(CapabilityTier::Legacy)
            .with_mount_table(MountTableReader::new(&fake.mounts))
            .with_stat_fs(ShrinkingStatFs::default());

        let block = info.block_info().unwrap();
        assert_eq!(block.total_size_bytes, 1000 * 4096);
        assert_eq!(block.path, fake.card);
    }

    #[test]
    fn test_statistics_failure_is_distinct_from_empty() {
        let fake = fake_card();
        let info = ExternalVolumeInfo::new(CapabilityTier::Modern)
            .with_mount_table(MountTableReader::new(&fake.mounts))
            .with_stat_fs(FailingStatFs);

        assert!(info.exists());
        match info.block_info_state() {
            BlockInfoState::Unavailable { reason } => {
                assert!(reason.contains("extSdCard"));
            }
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_first_access() {
        let fake = fake_card();
        let info = Arc::new(
            ExternalVolumeInfo::new(CapabilityTier::Modern)
                .with_mount_table(MountTableReader::new(&fake.mounts)),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let info = Arc::clone(&info);
                std::thread::spawn(move || {
                    (info.path().map(Path::to_path_buf), info.is_writable())
                })
            })
            .collect();

        for handle in handles {
            let (path, writable) = handle.join().unwrap();
            assert_eq!(path.as_deref(), Some(fake.card.as_path()));
            assert!(writable);
        }
        assert_eq!(fs::read_dir(&fake.card).unwrap().count(), 0);
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProbeConfig {
            tier: CapabilityTier::MultiDirectory,
            external_dirs: vec![PathBuf::from("/storage/emulated/0"), dir.path().into()],
            ..ProbeConfig::default()
        };

        let info = ExternalVolumeInfo::from_config(&config);
        assert_eq!(info.tier(), CapabilityTier::MultiDirectory);
        assert_eq!(info.path(), Some(dir.path()));
    }

    #[test]
    fn test_from_config_storage_root_with_app_subdir() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("emulated/0")).unwrap();
        let card_files = root.path().join("external_SD/Android/data/app/files");
        fs::create_dir_all(&card_files).unwrap();

        let config = ProbeConfig {
            tier: CapabilityTier::MultiDirectory,
            storage_root: root.path().to_path_buf(),
            app_subdir: Some(PathBuf::from("Android/data/app/files")),
            ..ProbeConfig::default()
        };

        let info = ExternalVolumeInfo::from_config(&config);
        assert_eq!(info.path(), Some(card_files.as_path()));
        assert!(info.is_writable());
    }
}
