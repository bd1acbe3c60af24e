//! XML configuration support.
//! - Loads settings from config.xml (quick_xml).
//! - Creates a secure template if missing (unless SHUTTERBATCH_CONFIG is set).
//!
//! This module only reads/writes the config file; per-run path validation
//! happens in the engine's path policy.

use anyhow::{anyhow, Context, Result};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
use super::types::{Config, LogLevel};
use super::{CONFIG_ENV, DEFAULT_BATCH_CAP};
use crate::planner::SortOrder;
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_file_secure_new_0600};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    data_dir: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    #[serde(default, deserialize_with = "de_usize_trimmed_opt")]
    batch_cap: Option<usize>,
    sort_order: Option<String>,
    prefix: Option<String>,
    #[serde(default, deserialize_with = "de_usize_trimmed_opt")]
    file_concurrency: Option<usize>,
    #[serde(default, deserialize_with = "de_usize_trimmed_opt")]
    dir_concurrency: Option<usize>,
}

// Custom deserializer that trims surrounding whitespace for optional usize.
fn de_usize_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| s.trim().parse::<usize>().ok()))
}

fn xml_to_config(parsed: XmlConfig) -> Config {
    let mut cfg = Config::default();

    if let Some(s) = parsed.data_dir.as_deref() {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            cfg.data_dir = PathBuf::from(trimmed);
        }
    }
    if let Some(s) = parsed.log_level.as_deref() {
        if let Ok(level) = s.trim().parse::<LogLevel>() {
            cfg.log_level = level;
        }
    }
    if let Some(s) = parsed.log_file.as_deref() {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            cfg.log_file = Some(PathBuf::from(trimmed));
        }
    }
    if let Some(cap) = parsed.batch_cap {
        cfg.batch_cap = cap;
    }
    if let Some(s) = parsed.sort_order.as_deref() {
        if let Some(order) = SortOrder::parse(s.trim()) {
            cfg.sort_order = order;
        }
    }
    if let Some(s) = parsed.prefix.as_deref() {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            cfg.prefix = Some(trimmed.to_string());
        }
    }
    if let Some(n) = parsed.file_concurrency {
        cfg.file_concurrency = n;
    }
    if let Some(n) = parsed.dir_concurrency {
        cfg.dir_concurrency = n;
    }
    cfg
}

/// Load a Config from a specific XML file path (quick_xml).
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    Ok(xml_to_config(parsed))
}

/// If SHUTTERBATCH_CONFIG is set, load and return that Config; otherwise Ok(None).
pub fn load_config_from_xml_env() -> Result<Option<Config>> {
    if let Some(p) = env::var_os(CONFIG_ENV) {
        let cfg = load_config_from_xml_path(Path::new(&p))?;
        return Ok(Some(cfg));
    }
    Ok(None)
}

/// Try loading Config from the platform default config.xml path.
/// Returns Ok(Some(cfg)) if the file exists and parses; Ok(None) if missing.
pub fn load_config_from_default_xml() -> Result<Option<Config>> {
    let Some(path) = default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let cfg = load_config_from_xml_path(&path)?;
    Ok(Some(cfg))
}

/// Create default template config file and parent directory (best-effort
/// permissions). Refuses to write through a symlinked ancestor.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        return Err(anyhow!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        ));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = set_dir_mode_0700(parent);
    }

    let suggested_log = default_log_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "/path/to/shutterbatch.log".into());

    let content = format!(
        "<!--\n  shutterbatch configuration (XML)\n\n  Fields:\n    data_dir          -> directory for progress records and rollback history\n    log_level         -> quiet | normal | info | debug\n    log_file          -> path to log file (optional; stdout still used)\n    batch_cap         -> default files per batch folder\n    sort_order        -> name-asc | name-desc | date-asc | date-desc | size-desc\n    prefix            -> folder naming pattern; {{count}}, {{date}}, {{year}}, {{month}} expand\n    file_concurrency  -> parallel file transfers\n    dir_concurrency   -> parallel folder creation (keep small)\n\n  Notes:\n    - CLI flags override XML values.\n    - Set {env} to use a config file at another location.\n-->\n<config>\n  <log_level>normal</log_level>\n  <log_file>{log}</log_file>\n  <batch_cap>{cap}</batch_cap>\n  <sort_order>size-desc</sort_order>\n  <prefix>Batch_{{count}}</prefix>\n  <file_concurrency>8</file_concurrency>\n  <dir_concurrency>2</dir_concurrency>\n</config>\n",
        env = CONFIG_ENV,
        log = suggested_log,
        cap = DEFAULT_BATCH_CAP,
    );

    // Atomic write, then tighten perms.
    write_file_secure_new_0600(path, content.as_bytes())?;
    let _ = set_file_mode_0600(path);

    info!("Created template config at {}", path.display());
    Ok(())
}

/// Create default config if SHUTTERBATCH_CONFIG not set; return created path
/// so the CLI can inform the user.
pub fn ensure_default_config_exists() -> Option<PathBuf> {
    if env::var_os(CONFIG_ENV).is_some() {
        return None;
    }
    let cfg_path = default_config_path()?;
    if cfg_path.exists() {
        return None;
    }
    if let Ok(true) = path_has_symlink_ancestor(&cfg_path) {
        eprintln!(
            "Refusing to create template config because an existing ancestor is a symlink: {}",
            cfg_path.display()
        );
        return None;
    }
    match create_template_config(&cfg_path) {
        Ok(()) => Some(cfg_path),
        Err(e) => {
            eprintln!(
                "Failed to create template config at {}: {}",
                cfg_path.display(),
                e
            );
            None
        }
    }
}
