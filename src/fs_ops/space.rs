//! Disk-space pre-flight for copy and cross-volume move runs.
//! Same-volume moves need no extra space and skip this check.

use std::path::Path;

use tracing::debug;

use crate::errors::EngineError;

/// Small cushion so a run that barely fits does not fill the volume to the
/// last byte.
const HEADROOM_BYTES: u64 = 64 * 1024 * 1024;

pub fn preflight_space(dest_dir: &Path, required: u64) -> Result<(), EngineError> {
    let available = match fs2::available_space(dest_dir) {
        Ok(v) => v,
        Err(e) => {
            // Unknown capacity (exotic filesystems): proceed and let per-file
            // errors surface instead of refusing up front.
            debug!(error = %e, path = %dest_dir.display(), "could not determine free space");
            return Ok(());
        }
    };

    let needed = required.saturating_add(HEADROOM_BYTES);
    if needed > available {
        return Err(EngineError::InsufficientSpace {
            required,
            available,
        });
    }
    debug!(required, available, "disk space pre-flight passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn tiny_requirement_passes() {
        let dir = tempdir().unwrap();
        assert!(preflight_space(dir.path(), 1024).is_ok());
    }

    #[test]
    fn absurd_requirement_fails() {
        let dir = tempdir().unwrap();
        let err = preflight_space(dir.path(), u64::MAX - HEADROOM_BYTES - 1).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientSpace { .. }));
    }
}
