//! Mount table reading and line parsing.
//!
//! The kernel exposes the currently mounted filesystems as a text
//! pseudo-file (`/proc/mounts`), one entry per line:
//!
//! ```text
//! /dev/block/vold/179:9 /storage/extSdCard vfat rw,dirsync,nosuid 0 0
//! ```
//!
//! Fields are whitespace-separated. Whitespace inside a path is written as
//! an octal escape (`\040` for a space).

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};

/// Default location of the kernel mount table.
pub const PROC_MOUNTS_PATH: &str = "/proc/mounts";

/// Reads the raw mount table text.
#[derive(Debug, Clone)]
pub struct MountTableReader {
    path: PathBuf,
}

impl Default for MountTableReader {
    fn default() -> Self {
        Self::new(PROC_MOUNTS_PATH)
    }
}

impl MountTableReader {
    /// Creates a reader for a specific mount table file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole mount table, reporting failures.
    ///
    /// The kernel copies bytes other than whitespace and backslash into
    /// mount paths verbatim, so a line may not be valid UTF-8. Such bytes
    /// are replaced with U+FFFD; the rest of the table is kept.
    pub fn try_read(&self) -> Result<String> {
        log::debug!("reading mount table at {}", self.path.display());
        let bytes = fs::read(&self.path).mount_table_context(&self.path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads the whole mount table.
    ///
    /// Never fails: an unreadable table is logged and yields an empty string.
    pub fn read(&self) -> String {
        match self.try_read() {
            Ok(contents) => contents,
            Err(e) => {
                log::warn!("{}", e.report());
                String::new()
            }
        }
    }
}

/// A single parsed mount table line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Source device (e.g., "/dev/block/vold/179:9").
    pub device: String,
    /// Mount point, with octal escapes decoded.
    pub mount_point: PathBuf,
    /// Filesystem type (e.g., "vfat").
    pub fstype: String,
    /// Raw comma-separated mount options.
    pub options: String,
}

impl MountEntry {
    /// Parses one mount table line.
    ///
    /// Returns None for blank lines and lines with fewer than three fields.
    /// A missing options field is tolerated.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let device = fields.next()?;
        let mount_point = fields.next()?;
        let fstype = fields.next()?;
        let options = fields.next().unwrap_or_default();

        Some(Self {
            device: device.to_string(),
            mount_point: PathBuf::from(unescape_mount_path(mount_point)),
            fstype: fstype.to_string(),
            options: options.to_string(),
        })
    }

    /// Returns true if the entry was mounted read-only.
    pub fn is_read_only(&self) -> bool {
        self.options.split(',').any(|opt| opt == "ro")
    }
}

/// Parses every well-formed line of a mount table, skipping the rest.
pub fn parse_mount_table(text: &str) -> Vec<MountEntry> {
    mount_table_lines(text).filter_map(MountEntry::parse).collect()
}

/// Splits mount table text into lines, accepting `\n`, `\r\n` and bare `\r`.
pub(crate) fn mount_table_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', '\r']).filter(|line| !line.trim().is_empty())
}

/// Decodes the kernel's `\NNN` octal escapes in a mount path.
///
/// Malformed sequences are kept verbatim. Decoded bytes that are not valid
/// UTF-8 become U+FFFD, so such a path no longer names the real directory
/// and a write probe against it fails.
pub fn unescape_mount_path(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(digits) = bytes.get(i + 1..i + 4)
            && digits.iter().all(|d| (b'0'..=b'7').contains(d))
        {
            let value = digits
                .iter()
                .fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
