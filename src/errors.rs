//! Typed error definitions for shutterbatch.
//! Provides the failure taxonomy used across the engine plus the sanitizer
//! that turns raw I/O errors into fixed user-facing text.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Batch capacity {0} is out of range (1..={max})", max = MAX_BATCH_CAP)]
    InvalidCap(usize),

    #[error("Folder name pattern contains an illegal character: '{0}'")]
    InvalidPattern(char),

    #[error("Folder is not approved for this operation: {0}")]
    PathNotApproved(PathBuf),

    #[error("Permission denied on {path}: {context}")]
    PermissionDenied { path: PathBuf, context: String },

    #[error("Insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace { required: u64, available: u64 },

    #[error("Operation interrupted by user")]
    Interrupted,

    #[error("No interrupted run to resume")]
    NothingToResume,

    #[error("No rollback manifest is available")]
    NothingToRollBack,

    #[error("History entry not found: {0}")]
    HistoryEntryMissing(String),

    #[error("History entry {0} is stale; its recorded files are no longer in place")]
    StaleHistoryEntry(String),
}

/// Upper bound for the per-batch file-count capacity.
pub const MAX_BATCH_CAP: usize = 100_000;

impl EngineError {
    /// Stable machine-readable code for structured logs and scripting.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidCap(_) => "invalid_cap",
            EngineError::InvalidPattern(_) => "invalid_pattern",
            EngineError::PathNotApproved(_) => "path_not_approved",
            EngineError::PermissionDenied { .. } => "permission_denied",
            EngineError::InsufficientSpace { .. } => "insufficient_space",
            EngineError::Interrupted => "interrupted",
            EngineError::NothingToResume => "nothing_to_resume",
            EngineError::NothingToRollBack => "nothing_to_roll_back",
            EngineError::HistoryEntryMissing(_) => "history_entry_missing",
            EngineError::StaleHistoryEntry(_) => "stale_history_entry",
        }
    }
}

/// Map an I/O error to fixed user-facing text.
///
/// Messages crossing the interface boundary must not leak raw paths or OS
/// detail; unrecognized errors degrade to a generic message.
pub fn sanitize_io(e: &io::Error) -> &'static str {
    match e.kind() {
        io::ErrorKind::NotFound => "file not found",
        io::ErrorKind::PermissionDenied => "permission denied",
        io::ErrorKind::AlreadyExists => "destination already exists",
        _ => {
            #[cfg(unix)]
            if let Some(code) = e.raw_os_error() {
                if code == libc::ENOSPC {
                    return "not enough disk space";
                }
                if code == libc::EXDEV {
                    return "destination is on a different volume";
                }
                if code == libc::EBUSY || code == libc::ETXTBSY {
                    return "file is in use by another process";
                }
            }
            "an unexpected file system error occurred"
        }
    }
}

/// Convenience for the per-file verification failure on cross-volume moves.
pub const VERIFY_MISMATCH: &str = "copied file size does not match the source; source was not removed";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::InvalidCap(0).code(), "invalid_cap");
        assert_eq!(EngineError::Interrupted.code(), "interrupted");
        assert_eq!(
            EngineError::StaleHistoryEntry("x".into()).code(),
            "stale_history_entry"
        );
    }

    #[test]
    fn sanitizer_hides_paths() {
        let e = io::Error::new(io::ErrorKind::NotFound, "/secret/location/img.jpg missing");
        let msg = sanitize_io(&e);
        assert_eq!(msg, "file not found");
        assert!(!msg.contains("/secret"));
    }

    #[test]
    fn sanitizer_degrades_to_generic() {
        let e = io::Error::other("weird");
        assert_eq!(sanitize_io(&e), "an unexpected file system error occurred");
    }
}
