//! Text and JSON rendering of probe results.
//!
//! Nothing in here decides anything; it only formats what the core library
//! reported.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use extsd_core::classify::classify_entry;
use extsd_core::mounts::parse_mount_table;
use extsd_core::{BlockInfoState, CapabilityTier, FileSystemBlockInfo, MountEntry, Writability};
use serde::Serialize;

const GIGABYTE: f64 = (1024u64 * 1024 * 1024) as f64;

/// Shown when no external SD card is found.
pub const NOT_FOUND_MESSAGE: &str = "(No external SD card found, sorry. Doesn't mean there isn't one, \
     we just couldn't find it based on our criteria)";

/// Everything the `status` command reports.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub tier: CapabilityTier,
    pub exists: bool,
    pub path: Option<PathBuf>,
    pub writability: Writability,
    pub block_info: BlockInfoState,
}

/// Formats a byte count as gigabytes with two decimals, e.g. `29.72GB`.
pub fn format_gigabytes(bytes: u64) -> String {
    format!("{:.2}GB", bytes as f64 / GIGABYTE)
}

/// Renders block statistics as the three usage lines.
pub fn render_usage(info: &FileSystemBlockInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total Size: {}", format_gigabytes(info.total_size_bytes));
    let _ = writeln!(
        out,
        "Available Size: {}",
        format_gigabytes(info.available_size_bytes)
    );
    let _ = writeln!(out, "Free Size: {}", format_gigabytes(info.free_size_bytes));
    out
}

pub fn render_status(report: &StatusReport) -> String {
    let Some(path) = &report.path else {
        return format!("{}\n", NOT_FOUND_MESSAGE);
    };

    let mut out = String::new();
    let _ = writeln!(out, "External SD card: {}", path.display());
    let _ = writeln!(out, "Is writable: {}", report.writability.is_writable());
    if let Writability::NotWritable { reason } = &report.writability {
        let _ = writeln!(out, "  ({})", reason);
    }

    match &report.block_info {
        BlockInfoState::Available(info) => {
            let _ = writeln!(out, "Usage:");
            out.push_str(&render_usage(info));
        }
        BlockInfoState::Unavailable { reason } => {
            let _ = writeln!(out, "Usage: unavailable ({})", reason);
        }
        BlockInfoState::NoVolume => {}
    }
    out
}

/// One mount table entry as the `mounts` command reports it.
#[derive(Debug, Serialize)]
pub struct MountRow {
    pub device: String,
    pub mount_point: PathBuf,
    pub fstype: String,
    pub read_only: bool,
}

impl From<&MountEntry> for MountRow {
    fn from(entry: &MountEntry) -> Self {
        Self {
            device: entry.device.clone(),
            mount_point: entry.mount_point.clone(),
            fstype: entry.fstype.clone(),
            read_only: entry.is_read_only(),
        }
    }
}

/// Everything the `mounts` command reports.
#[derive(Debug, Serialize)]
pub struct MountsReport {
    pub source: PathBuf,
    #[serde(skip)]
    pub raw: String,
    pub entries: Vec<MountRow>,
    /// The line the classifier picked as the external SD card.
    pub external_sd: Option<MountRow>,
}

impl MountsReport {
    pub fn from_table(raw: String, source: &Path) -> Self {
        let entries = parse_mount_table(&raw).iter().map(MountRow::from).collect();
        let external_sd = classify_entry(&raw)
            .and_then(|candidate| candidate.entry())
            .map(|entry| MountRow::from(&entry));

        Self {
            source: source.to_path_buf(),
            raw,
            entries,
            external_sd,
        }
    }
}

/// Renders the raw mount table followed by the external SD card line, or a
/// note that the table couldn't be read.
pub fn render_mount_table(report: &MountsReport) -> String {
    if report.raw.trim().is_empty() {
        return format!("Couldn't read {}\n", report.source.display());
    }

    let mut out = report.raw.clone();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    match &report.external_sd {
        Some(row) => {
            let mode = if row.read_only { "ro" } else { "rw" };
            let _ = writeln!(
                out,
                "External SD card entry: {} on {} ({}, {})",
                row.device,
                row.mount_point.display(),
                row.fstype,
                mode
            );
        }
        None => {
            let _ = writeln!(out, "External SD card entry: none");
        }
    }
    out
}
