//! Default path helpers and symlink checks.
//! Determines OS-appropriate config/data/log paths and detects symlinked
//! ancestors before anything is written through them.

use dirs::{config_dir, data_dir};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// OS-appropriate default config path.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(mut base) = config_dir() {
        base.push("shutterbatch");
        base.push("config.xml");
        Some(base)
    } else {
        std::env::var("HOME").ok().map(|h| {
            PathBuf::from(h)
                .join(".config")
                .join("shutterbatch")
                .join("config.xml")
        })
    }
}

/// OS-appropriate default data directory (progress record, secret, history).
pub fn default_data_dir() -> Option<PathBuf> {
    if let Some(mut base) = data_dir() {
        base.push("shutterbatch");
        Some(base)
    } else {
        std::env::var("HOME").ok().map(|h| {
            PathBuf::from(h)
                .join(".local")
                .join("share")
                .join("shutterbatch")
        })
    }
}

/// OS-appropriate default log file path (data dir).
pub fn default_log_path() -> Option<PathBuf> {
    let mut base = default_data_dir()?;
    // ensure dir exists (best-effort)
    let _ = fs::create_dir_all(&base);
    base.push("shutterbatch.log");
    Some(base)
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() {
            let meta = fs::symlink_metadata(anc)?;
            if meta.file_type().is_symlink() {
                return Ok(true);
            }
        }
        p = anc.parent();
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_paths_end_with_expected_names() {
        if let Some(p) = default_config_path() {
            assert!(p.ends_with("shutterbatch/config.xml"));
        }
        if let Some(p) = default_log_path() {
            assert!(p.ends_with("shutterbatch/shutterbatch.log"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn detects_symlinked_ancestor() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir_all(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(path_has_symlink_ancestor(&link.join("config.xml")).unwrap());
        assert!(!path_has_symlink_ancestor(&real.join("config.xml")).unwrap());
    }
}
