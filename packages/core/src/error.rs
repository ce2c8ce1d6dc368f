//! Unified error types for the extsd-core library.
//!
//! Uses SNAFU for context-rich error handling. The same `std::io::Error`
//! shows up when reading the mount table, writing a probe file and removing
//! it again, so every variant carries the path it was working on.

use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The mount table pseudo-file could not be read.
    #[snafu(display("failed to read mount table at {}", path.display()))]
    MountTableRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The write probe could not create or write its file.
    #[snafu(display("failed to write probe file {}", path.display()))]
    WriteProbe {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The probe file was written but cannot be found afterwards.
    #[snafu(display("probe file {} vanished after writing", path.display()))]
    ProbeMissing { path: PathBuf },

    /// The probe file could not be removed.
    #[snafu(display("failed to remove probe file {}", path.display()))]
    ProbeCleanup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The filesystem statistics query failed.
    #[snafu(display("failed to query filesystem statistics for {}", path.display()))]
    Statistics { path: PathBuf, source: nix::Error },

    /// Configuration file cannot be read.
    #[snafu(display("failed to read config at {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for `ProbeConfig`.
    #[snafu(display("failed to parse config at {}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Platform API level could not be parsed.
    #[snafu(display("invalid platform API level: {value}"))]
    InvalidApiLevel { value: String },

    /// Unknown capability tier name.
    #[snafu(display("unknown capability tier '{value}' (expected legacy, modern or multi-directory)"))]
    InvalidTier { value: String },
}

/// Extension trait for adding path context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for mount table read errors.
    fn mount_table_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for probe write errors.
    fn probe_write_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for probe cleanup errors.
    fn probe_cleanup_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for config read errors.
    fn config_read_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn mount_table_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(MountTableReadSnafu { path: path.into() })
    }

    fn probe_write_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(WriteProbeSnafu { path: path.into() })
    }

    fn probe_cleanup_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(ProbeCleanupSnafu { path: path.into() })
    }

    fn config_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(ConfigReadSnafu { path: path.into() })
    }
}

impl Error {
    /// Formats the error followed by its source chain on one line.
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
