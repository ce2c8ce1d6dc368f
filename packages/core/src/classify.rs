//! External SD card detection from mount table text.
//!
//! This is a substring heuristic. A line qualifies when it mentions
//! `storage` and also contains `ext`, `sd` and `fat` somewhere (all
//! case-insensitive), e.g.:
//!
//! ```text
//! /dev/block/vold/259:3 /storage/sdcard0 vfat rw,dirsync      <- internal, no "ext"
//! /dev/block/vold/179:9 /storage/extSdCard vfat rw,dirsync    <- external SD card
//! ```
//!
//! `fat` covers `vfat`, `exfat`, `texfat` and friends. A card mounted under
//! any other naming convention is not found.

use std::path::PathBuf;

use crate::mounts::{self, MountEntry};

/// Coarse filter: the conventional removable-storage root.
const STORAGE_MARKER: &str = "storage";

/// Every marker must appear somewhere in a qualifying line.
const CANDIDATE_MARKERS: [&str; 3] = ["ext", "sd", "fat"];

/// The field returned as the mount path must contain this.
const STORAGE_PATH_MARKER: &str = "/storage/";

/// The mount table line chosen as the external SD card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountCandidate {
    /// The raw matched line.
    pub line: String,
    /// Mount path taken from the line, unescaped, without trailing '/'.
    pub path: PathBuf,
}

impl MountCandidate {
    /// Parses the matched line into its fields, if it is well-formed.
    pub fn entry(&self) -> Option<MountEntry> {
        MountEntry::parse(&self.line)
    }
}

/// Returns the mount path of the external SD card, if one is recognised.
pub fn classify(mount_table: &str) -> Option<PathBuf> {
    classify_entry(mount_table).map(|candidate| candidate.path)
}

/// Like [`classify`], but also returns the line that matched.
///
/// Only the first qualifying line in document order is considered. If that
/// line has no `/storage/` field the result is None; later lines are not
/// tried.
pub fn classify_entry(mount_table: &str) -> Option<MountCandidate> {
    let line = mounts::mount_table_lines(mount_table)
        .map(|line| (line, line.to_lowercase()))
        .filter(|(_, lower)| lower.contains(STORAGE_MARKER))
        .find(|(_, lower)| CANDIDATE_MARKERS.iter().all(|m| lower.contains(m)))
        .map(|(line, _)| line);

    let Some(line) = line else {
        log::debug!("no mount table line looks like an external SD card");
        return None;
    };
    log::debug!("best external SD card candidate: {}", line.trim());

    let field = line
        .split_whitespace()
        .find(|field| field.to_lowercase().contains(STORAGE_PATH_MARKER));

    let Some(field) = field else {
        log::debug!("candidate line has no {} field", STORAGE_PATH_MARKER);
        return None;
    };

    let unescaped = mounts::unescape_mount_path(field);
    let path = unescaped.trim_end_matches('/');

    Some(MountCandidate {
        line: line.to_string(),
        path: PathBuf::from(path),
    })
}
