//! Filesystem primitives: durable renames, verified copies, volume
//! detection and disk-space pre-flight.

pub mod atomic;
pub mod copy;
pub mod space;
pub mod volume;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub use atomic::{atomic_write, rename_durable};
pub use copy::{copy_to_temp_then_rename, move_cross_volume, verify_size};
pub use space::preflight_space;
pub use volume::same_volume;

/// Unique sibling temp path inside `dir`. Uniqueness comes from pid + nanos;
/// `create_new` on open still guards against the pathological collision.
pub(crate) fn unique_temp_path(dir: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    dir.join(format!(".shutterbatch.{pid}.{nanos}.tmp"))
}

#[cfg(unix)]
pub(crate) fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[cfg(not(unix))]
pub(crate) fn fsync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
