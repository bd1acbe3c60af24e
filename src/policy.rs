//! Collaborator seams consumed by the engine: path approval, file-type
//! eligibility and capture-date lookup. Defaults cover the common case; the
//! interface layer can substitute its own implementations.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::errors::EngineError;

/// Pre-approves the source/output folder pair before Plan or Execute touch it.
pub trait PathPolicy: Send + Sync {
    fn approve(&self, source: &Path, output: &Path) -> Result<(), EngineError>;
}

/// Allow/deny decision per file name, applied during grouping.
pub trait FileTypePolicy: Send + Sync {
    fn eligible(&self, file_name: &str) -> bool;
}

/// Supplies a per-file timestamp for date-based sorting. Returning None makes
/// the planner fall back to filesystem times.
pub trait CaptureDateProvider: Send + Sync {
    fn capture_date(&self, path: &Path) -> Option<DateTime<Utc>>;
}

/// Default path approval:
/// - both folders must exist and be directories
/// - neither may be nested inside the other (an output inside the source
///   would be re-scanned; a source inside the output could be clobbered)
/// - neither may be a filesystem root
pub struct DefaultPathPolicy;

impl PathPolicy for DefaultPathPolicy {
    fn approve(&self, source: &Path, output: &Path) -> Result<(), EngineError> {
        for p in [source, output] {
            if !p.is_dir() {
                return Err(EngineError::PathNotApproved(p.to_path_buf()));
            }
            if p.parent().is_none() {
                return Err(EngineError::PathNotApproved(p.to_path_buf()));
            }
        }
        let src = canonical_or(source);
        let out = canonical_or(output);
        if src == out || src.starts_with(&out) || out.starts_with(&src) {
            return Err(EngineError::PathNotApproved(output.to_path_buf()));
        }
        Ok(())
    }
}

fn canonical_or(p: &Path) -> PathBuf {
    std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf())
}

/// Photo/video extension allow-list plus a deny-list of OS metadata files.
/// Hidden (dot-prefixed) files are never eligible.
pub struct MediaTypePolicy;

const MEDIA_EXTENSIONS: &[&str] = &[
    // stills
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "heic", "heif",
    // raw
    "raw", "dng", "cr2", "cr3", "nef", "nrw", "arw", "orf", "rw2", "raf", "pef", "srw",
    // video
    "mp4", "mov", "avi", "m4v", "mts", "m2ts", "mkv", "wmv", "3gp",
];

const DENIED_NAMES: &[&str] = &["thumbs.db", "desktop.ini", "zbthumbnail.info"];

impl FileTypePolicy for MediaTypePolicy {
    fn eligible(&self, file_name: &str) -> bool {
        if file_name.starts_with('.') {
            return false;
        }
        let lower = file_name.to_ascii_lowercase();
        if DENIED_NAMES.contains(&lower.as_str()) {
            return false;
        }
        match lower.rsplit_once('.') {
            Some((_, ext)) => MEDIA_EXTENSIONS.contains(&ext),
            None => false,
        }
    }
}

/// Filesystem-timestamp capture-date fallback.
///
/// Takes the minimum of creation and modification time: a copy can reset the
/// creation time while preserving modification time, so the earlier of the
/// two is the better estimate of original capture time.
pub struct FsDateProvider;

impl CaptureDateProvider for FsDateProvider {
    fn capture_date(&self, path: &Path) -> Option<DateTime<Utc>> {
        let meta = std::fs::metadata(path).ok()?;
        let modified = meta.modified().ok();
        let created = meta.created().ok();
        let earliest = match (created, modified) {
            (Some(c), Some(m)) => Some(c.min(m)),
            (c, m) => c.or(m),
        }?;
        let secs = earliest.duration_since(SystemTime::UNIX_EPOCH).ok()?;
        DateTime::<Utc>::from_timestamp(secs.as_secs() as i64, secs.subsec_nanos())
    }
}
