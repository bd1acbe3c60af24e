//! Config module.
//! Provides configuration types, default paths and XML loading.
//! Re-exports keep the public API flat for external callers.

pub mod paths;
pub mod types;
pub mod xml;

pub use paths::{default_config_path, default_data_dir, default_log_path, path_has_symlink_ancestor};
pub use types::{Config, LogLevel};
pub use xml::{
    create_template_config, ensure_default_config_exists, load_config_from_default_xml,
    load_config_from_xml_env, load_config_from_xml_path,
};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SHUTTERBATCH_CONFIG";

/// Default per-batch file-count capacity.
pub const DEFAULT_BATCH_CAP: usize = 500;
