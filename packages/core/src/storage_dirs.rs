//! External storage directory lists.
//!
//! Newer platforms enumerate one storage directory per mounted volume. By
//! convention the first entry is always the primary (internal, emulated)
//! storage. Anything after that is permanently mounted removable media,
//! such as a card in an SD slot.
//!
//! ```text
//! /storage/emulated/0/Android/data/<app>/files     <- internal
//! /storage/external_SD/Android/data/<app>/files    <- SD card
//! ```

use std::fs;
use std::path::{Path, PathBuf};

/// Default root under which volumes are mounted.
pub const STORAGE_ROOT: &str = "/storage";

/// Primary storage, relative to the storage root.
const PRIMARY_VOLUME: &str = "emulated/0";

/// Root entries that never hold a removable volume.
const SKIPPED_ROOT_ENTRIES: &[&str] = &["emulated", "self"];

/// Platform query for per-volume external storage directories.
pub trait StorageDirectories {
    /// Returns the directory list, primary storage first.
    fn external_dirs(&self) -> Vec<PathBuf>;
}

/// A directory list supplied up front (from configuration or a test).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedDirectories(pub Vec<PathBuf>);

impl StorageDirectories for FixedDirectories {
    fn external_dirs(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}

/// Enumerates volumes under a storage root such as `/storage`.
///
/// Produces the primary volume (`<root>/emulated/0`) followed by every other
/// directory directly under the root, in name order. If the primary volume is
/// missing the root is not laid out as expected and the list is empty.
#[derive(Debug, Clone)]
pub struct StorageRootDirectories {
    root: PathBuf,
    app_subdir: Option<PathBuf>,
}

impl Default for StorageRootDirectories {
    fn default() -> Self {
        Self::new(STORAGE_ROOT)
    }
}

impl StorageRootDirectories {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            app_subdir: None,
        }
    }

    /// Appends an application-specific subdirectory to every volume,
    /// e.g. `Android/data/com.example/files`.
    pub fn with_app_subdir(mut self, subdir: impl Into<PathBuf>) -> Self {
        self.app_subdir = Some(subdir.into());
        self
    }

    fn volume_dir(&self, volume: &Path) -> PathBuf {
        match &self.app_subdir {
            Some(subdir) => volume.join(subdir),
            None => volume.to_path_buf(),
        }
    }
}

impl StorageDirectories for StorageRootDirectories {
    fn external_dirs(&self) -> Vec<PathBuf> {
        let primary = self.root.join(PRIMARY_VOLUME);
        if !primary.is_dir() {
            log::debug!("no primary volume at {}", primary.display());
            return Vec::new();
        }

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("failed to list {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let mut volumes: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter(|entry| {
                let name = entry.file_name();
                !name
                    .to_str()
                    .is_some_and(|name| SKIPPED_ROOT_ENTRIES.contains(&name))
            })
            .map(|entry| entry.path())
            .collect();
        volumes.sort();

        std::iter::once(primary)
            .chain(volumes)
            .map(|volume| self.volume_dir(&volume))
            .collect()
    }
}

/// Returns the removable-media directory from a platform directory list.
///
/// The first entry is internal storage and is never returned, even when it
/// is the only one.
pub fn alternate_path(dirs: &dyn StorageDirectories) -> Option<PathBuf> {
    let list = dirs.external_dirs();
    for (index, dir) in list.iter().enumerate() {
        log::debug!("external storage dir {}: {}", index, dir.display());
    }

    list.into_iter().nth(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternate_path_skips_internal() {
        let dirs = FixedDirectories(vec![
            PathBuf::from("/storage/emulated/0/Android/data/app/files"),
            PathBuf::from("/storage/external_SD/Android/data/app/files"),
        ]);
        assert_eq!(
            alternate_path(&dirs),
            Some(PathBuf::from("/storage/external_SD/Android/data/app/files"))
        );
    }

    #[test]
    fn test_alternate_path_single_entry() {
        let dirs = FixedDirectories(vec![PathBuf::from("/storage/emulated/0")]);
        assert_eq!(alternate_path(&dirs), None);
    }

    #[test]
    fn test_alternate_path_empty() {
        assert_eq!(alternate_path(&FixedDirectories::default()), None);
    }

    #[test]
    fn test_alternate_path_takes_second_of_many() {
        let dirs = FixedDirectories(vec![
            PathBuf::from("/storage/emulated/0"),
            PathBuf::from("/storage/1234-ABCD"),
            PathBuf::from("/storage/5678-EF01"),
        ]);
        assert_eq!(alternate_path(&dirs), Some(PathBuf::from("/storage/1234-ABCD")));
    }

    #[test]
    fn test_storage_root_enumeration() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("emulated/0")).unwrap();
        fs::create_dir_all(root.path().join("self/primary")).unwrap();
        fs::create_dir_all(root.path().join("external_SD")).unwrap();
        fs::create_dir_all(root.path().join("0AB1-2C3D")).unwrap();
        fs::write(root.path().join("not-a-volume"), "").unwrap();

        let dirs = StorageRootDirectories::new(root.path()).external_dirs();
        assert_eq!(
            dirs,
            vec![
                root.path().join("emulated/0"),
                root.path().join("0AB1-2C3D"),
                root.path().join("external_SD"),
            ]
        );
    }

    #[test]
    fn test_storage_root_with_app_subdir() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("emulated/0")).unwrap();
        fs::create_dir_all(root.path().join("external_SD")).unwrap();

        let source =
            StorageRootDirectories::new(root.path()).with_app_subdir("Android/data/app/files");
        assert_eq!(
            alternate_path(&source),
            Some(root.path().join("external_SD/Android/data/app/files"))
        );
    }

    #[test]
    fn test_storage_root_without_primary() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("external_SD")).unwrap();

        let source = StorageRootDirectories::new(root.path());
        assert!(source.external_dirs().is_empty());
        assert_eq!(alternate_path(&source), None);
    }
}
