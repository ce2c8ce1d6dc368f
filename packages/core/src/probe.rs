//! Physical write probe.
//!
//! Mount flags and permission bits are not a reliable predictor of whether
//! removable media can actually be written, so the probe writes a small
//! file, checks that it is there and deletes it again.
//!
//! This is an expensive call: it touches the media every time.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::{Error, IoResultExt, Result};

/// Contents of the probe file.
pub const PROBE_PAYLOAD: &str = "some test text";

/// Random bytes in a probe file name (hex-encoded, so twice as many chars).
const PROBE_NAME_BYTES: usize = 16;

/// Returns a fresh, collision-resistant probe file path inside `dir`.
pub fn probe_file_path(dir: &Path) -> PathBuf {
    let mut bytes = [0u8; PROBE_NAME_BYTES];
    rand::rng().fill(&mut bytes);
    dir.join(format!("{}.txt", hex::encode(bytes)))
}

/// Writes, verifies and removes a probe file in `dir`.
///
/// A probe file that cannot be removed is reported as a failure as well,
/// since it would be left behind on the user's media.
pub fn probe_write(dir: &Path) -> Result<()> {
    write_verify_remove(&probe_file_path(dir))
}

/// Creates `probe` (never reusing an existing file), then checks and removes it.
fn write_verify_remove(probe: &Path) -> Result<()> {
    log::info!("trying to write test data to {}", probe.display());

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(probe)
        .probe_write_context(probe)?;

    let written = file.write_all(PROBE_PAYLOAD.as_bytes()).and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = written {
        // We created the file, so a partial write (e.g. disk full) is ours to remove.
        let _ = fs::remove_file(probe);
        return Err(e).probe_write_context(probe);
    }

    if !probe.is_file() {
        return Err(Error::ProbeMissing {
            path: probe.to_path_buf(),
        });
    }
    log::info!("wrote test data to {}", probe.display());

    fs::remove_file(probe).probe_cleanup_context(probe)?;
    log::info!("cleaned up test data file {}", probe.display());

    Ok(())
}

/// Returns true if `dir` can be written to.
///
/// Every failure (missing directory, permission denied, read-only or full
/// filesystem) is logged and reported as `false`.
pub fn is_writable(dir: &Path) -> bool {
    match probe_write(dir) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("write probe failed: {}", e.report());
            false
        }
    }
}
