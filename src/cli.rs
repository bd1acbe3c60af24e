//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - CLI flags override config values (which are loaded from XML if present).
//! - --debug is a shorthand for --log-level debug.

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::types::{Config, LogLevel};
use crate::planner::SortOrder;

/// Organize large photo/video folders into size-capped batch folders.
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Split large photo/video folders into size-capped batch folders, safely and reversibly"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Override the data directory (progress record, rollback history).
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs in structured JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Print the config file location used by shutterbatch and exit.
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the batch plan without touching any files.
    Plan(RunArgs),
    /// Plan and execute (copy by default; --move to relocate).
    Run(RunArgs),
    /// Continue an interrupted run from where it stopped.
    Resume,
    /// Throw away the record of an interrupted run.
    Discard,
    /// Reverse the most recent move run (or a specific one with --id).
    Rollback {
        /// Operation id from `history` to roll back instead of the latest.
        #[arg(long)]
        id: Option<Uuid>,
    },
    /// List past move runs available for rollback.
    History,
    /// Delete one history entry without rolling it back.
    Forget {
        /// Operation id from `history`.
        id: Uuid,
    },
    /// Delete all retained history entries.
    ClearHistory,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Folder containing the photos/videos to organize.
    #[arg(value_hint = ValueHint::DirPath)]
    pub source: PathBuf,

    /// Folder that will receive the batch folders.
    #[arg(value_hint = ValueHint::DirPath)]
    pub output: PathBuf,

    /// Maximum files per batch folder.
    #[arg(long)]
    pub cap: Option<usize>,

    /// Folder naming pattern; {count}, {date}, {year}, {month} expand.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Group ordering: name-asc, name-desc, date-asc, date-desc, size-desc.
    #[arg(long)]
    pub sort: Option<SortOrder>,

    /// Move files instead of copying them (reversible via `rollback`).
    #[arg(long = "move")]
    pub move_files: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset
    /// flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(dir) = &self.data_dir {
            cfg.data_dir = dir.clone();
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(Command::Plan(run) | Command::Run(run)) = &self.command {
            if let Some(cap) = run.cap {
                cfg.batch_cap = cap;
            }
            if let Some(prefix) = &run.prefix {
                cfg.prefix = Some(prefix.clone());
            }
            if let Some(sort) = run.sort {
                cfg.sort_order = sort;
            }
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
