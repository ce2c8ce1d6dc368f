//! extsd-core: Core library for external SD card detection.
//!
//! This library finds a removable SD card on a Linux-kernel based device,
//! confirms that it can really be written to, and reports how much space it
//! has, without relying on a platform API that states this directly.
//!
//! # Modules
//!
//! - [`mounts`]: Reading and parsing the kernel mount table
//! - [`classify`]: Picking the external SD card out of the mount table
//! - [`probe`]: Physical write probe
//! - [`stats`]: Block statistics across 32-bit and 64-bit counter APIs
//! - [`storage_dirs`]: Platform external storage directory lists
//! - [`capability`]: Platform capability tiers
//! - [`volume`]: Memoized composition of all of the above
//! - [`config`]: Probe configuration
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use extsd_core::{CapabilityTier, ExternalVolumeInfo};
//!
//! let info = ExternalVolumeInfo::new(CapabilityTier::Modern);
//! if let Some(path) = info.path() {
//!     println!("external SD card at {}", path.display());
//!     println!("writable: {}", info.is_writable());
//!     if let Some(block) = info.block_info() {
//!         println!("{} bytes available", block.available_size_bytes);
//!     }
//! }
//! ```

pub mod capability;
pub mod classify;
pub mod config;
pub mod error;
pub mod mounts;
pub mod probe;
pub mod stats;
pub mod storage_dirs;
pub mod volume;

// Re-export commonly used types
pub use capability::CapabilityTier;
pub use classify::classify;
pub use config::ProbeConfig;
pub use error::{Error, Result};
pub use mounts::{MountEntry, MountTableReader};
pub use probe::is_writable;
pub use stats::{FileSystemBlockInfo, NixStatFs, StatFs};
pub use storage_dirs::{StorageDirectories, alternate_path};
pub use volume::{BlockInfoState, ExternalVolumeInfo, Writability};
