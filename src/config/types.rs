//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Result};

use super::paths;
use super::DEFAULT_BATCH_CAP;
use crate::errors::MAX_BATCH_CAP;
use crate::executor::ExecOptions;
use crate::planner::SortOrder;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration used by the organizer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where progress records, the integrity secret and rollback history live
    pub data_dir: PathBuf,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Per-batch file-count capacity used when the CLI gives none
    pub batch_cap: usize,
    /// Group ordering applied before packing
    pub sort_order: SortOrder,
    /// Batch folder naming pattern; None means the built-in default
    pub prefix: Option<String>,
    /// In-flight file transfer ceiling
    pub file_concurrency: usize,
    /// Directory creation ceiling (kept low to bound open descriptors)
    pub dir_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        let exec = ExecOptions::default();
        Self {
            data_dir: paths::default_data_dir().unwrap_or_else(|| PathBuf::from(".shutterbatch")),
            log_level: LogLevel::Normal,
            log_file: paths::default_log_path(),
            batch_cap: DEFAULT_BATCH_CAP,
            sort_order: SortOrder::default(),
            prefix: None,
            file_concurrency: exec.file_concurrency,
            dir_concurrency: exec.dir_concurrency,
        }
    }
}

impl Config {
    /// Sanity checks applied after XML and CLI merging, before anything runs.
    pub fn validate(&self) -> Result<()> {
        if self.batch_cap == 0 || self.batch_cap > MAX_BATCH_CAP {
            bail!(
                "batch_cap {} is out of range (1..={})",
                self.batch_cap,
                MAX_BATCH_CAP
            );
        }
        if self.file_concurrency == 0 {
            bail!("file_concurrency must be at least 1");
        }
        if self.dir_concurrency == 0 {
            bail!("dir_concurrency must be at least 1");
        }
        Ok(())
    }

    /// Executor tunables derived from this config.
    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            file_concurrency: self.file_concurrency,
            dir_concurrency: self.dir_concurrency,
            ..ExecOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_cap_is_rejected() {
        let cfg = Config {
            batch_cap: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn log_level_parses_aliases() {
        assert_eq!(LogLevel::parse("VERBOSE"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("trace"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("nope"), None);
    }
}
