//! Same-volume detection.
//!
//! Decides whether two paths resolve to the same underlying storage device,
//! which determines whether an instantaneous rename is possible. On Unix the
//! device ids of the nearest existing ancestors are compared; on Windows the
//! root components (drive letter or UNC prefix). When nothing can be
//! determined the answer is "same volume" — the subsequent rename then fails
//! with a cross-device error that surfaces normally instead of silently
//! picking the slower copy path.

use std::path::Path;

pub fn same_volume(a: &Path, b: &Path) -> bool {
    #[cfg(unix)]
    {
        return match (device_id(a), device_id(b)) {
            (Some(da), Some(db)) => da == db,
            _ => true,
        };
    }

    #[cfg(not(unix))]
    {
        use std::path::Component;
        let root = |p: &Path| {
            p.components().next().and_then(|c| match c {
                Component::Prefix(prefix) => {
                    Some(prefix.as_os_str().to_string_lossy().to_ascii_uppercase())
                }
                _ => None,
            })
        };
        match (root(a), root(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => true,
        }
    }
}

/// Device id of the path, or of its nearest existing ancestor (a destination
/// folder usually does not exist yet when the strategy is chosen).
#[cfg(unix)]
fn device_id(path: &Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    let mut p = path;
    loop {
        if let Ok(meta) = std::fs::metadata(p) {
            return Some(meta.dev());
        }
        p = p.parent()?;
    }
}
