//! Environment variables exchanged with type scripts
//!
//! The names are a wire format shared with existing type implementations and
//! must not change.

use log::LevelFilter;

pub const TARGET_HOST: &str = "__target_host";
pub const TARGET_HOSTNAME: &str = "__target_hostname";
pub const TARGET_FQDN: &str = "__target_fqdn";
pub const GLOBAL: &str = "__global";
pub const MANIFEST: &str = "__manifest";
pub const CDIST_MANIFEST: &str = "__cdist_manifest";
pub const TYPE_BASE_PATH: &str = "__cdist_type_base_path";
pub const OBJECT: &str = "__object";
pub const OBJECT_ID: &str = "__object_id";
pub const OBJECT_NAME: &str = "__object_name";
pub const OBJECT_FQ: &str = "__object_fq";
pub const TYPE: &str = "__type";
pub const FILES: &str = "__files";
pub const EXPLORER: &str = "__explorer";
pub const TYPE_EXPLORER: &str = "__type_explorer";
pub const MESSAGES_IN: &str = "__messages_in";
pub const MESSAGES_OUT: &str = "__messages_out";
pub const OBJECT_MARKER: &str = "__cdist_object_marker";
pub const DRY_RUN: &str = "__cdist_dry_run";
pub const LOG_LEVEL: &str = "__cdist_log_level";
pub const LOG_LEVEL_NAME: &str = "__cdist_log_level_name";
pub const REQUIRE: &str = "require";
pub const ORDER_DEPENDENCY: &str = "CDIST_ORDER_DEPENDENCY";
pub const OVERRIDE: &str = "CDIST_OVERRIDE";

/// Numeric level and level name as exported to scripts.
pub fn log_level_env(level: LevelFilter) -> [(&'static str, String); 2] {
    let (value, name) = match level {
        LevelFilter::Trace => (5, "TRACE"),
        LevelFilter::Debug => (10, "DEBUG"),
        LevelFilter::Info => (20, "INFO"),
        LevelFilter::Warn => (30, "WARNING"),
        LevelFilter::Error | LevelFilter::Off => (40, "ERROR"),
    };
    [
        (LOG_LEVEL, value.to_string()),
        (LOG_LEVEL_NAME, name.to_string()),
    ]
}

/// Inverse of [`log_level_env`] for the numeric value.
pub fn parse_log_level(value: &str) -> Option<LevelFilter> {
    let value: u32 = value.trim().parse().ok()?;
    Some(match value {
        0..=5 => LevelFilter::Trace,
        6..=10 => LevelFilter::Debug,
        11..=20 => LevelFilter::Info,
        21..=30 => LevelFilter::Warn,
        _ => LevelFilter::Error,
    })
}
