//! Settings file and its merge with the command line

use crate::cli::RunArgs;
use crate::paths;
use anyhow::{Context, Result, bail};
use declarative::{RunMode, RunOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use transport::ArchiveMode;

/// Contents of `cdist.toml`. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub conf_dir: Vec<String>,
    pub init_manifest: Option<String>,
    pub out_path: Option<String>,
    pub cache_path: Option<String>,
    pub cache_path_pattern: Option<String>,
    pub remote_out_path: Option<String>,
    pub remote_exec: Option<String>,
    pub remote_copy: Option<String>,
    pub local_shell: Option<String>,
    pub remote_shell: Option<String>,
    pub jobs: Option<usize>,
    pub parallel: Option<usize>,
    pub archiving: Option<String>,
    pub save_output_streams: Option<bool>,
    pub cleanup_commands: Vec<String>,
}

/// Options for every host of one invocation
#[derive(Debug, Clone)]
pub struct Resolved {
    pub options: RunOptions,
    /// Hosts configured at the same time.
    pub parallel: usize,
}

impl Settings {
    /// Load the config file, or defaults when there is none.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Merge with the command line. Flags win over file values.
    pub fn resolve(&self, args: &RunArgs, mode: RunMode) -> Result<Resolved> {
        let defaults = RunOptions::default();
        let conf_dirs = if args.conf_dirs.is_empty() {
            self.conf_dir.iter().map(|dir| paths::expand(dir)).collect()
        } else {
            args.conf_dirs.clone()
        };
        let archiving = args
            .archiving
            .as_deref()
            .or(self.archiving.as_deref())
            .map(parse_archiving)
            .transpose()?
            .flatten();

        let options = RunOptions {
            conf_dirs,
            initial_manifest: args
                .initial_manifest
                .clone()
                .or_else(|| self.init_manifest.as_deref().map(paths::expand)),
            out_path: args
                .out_path
                .clone()
                .or_else(|| self.out_path.as_deref().map(paths::expand)),
            remote_out_path: args
                .remote_out_path
                .clone()
                .or_else(|| self.remote_out_path.as_deref().map(PathBuf::from))
                .unwrap_or(defaults.remote_out_path),
            remote_exec: args
                .remote_exec
                .clone()
                .or_else(|| self.remote_exec.clone())
                .unwrap_or(defaults.remote_exec),
            remote_copy: args
                .remote_copy
                .clone()
                .or_else(|| self.remote_copy.clone())
                .unwrap_or(defaults.remote_copy),
            local_shell: self.local_shell.clone().unwrap_or(defaults.local_shell),
            remote_shell: self.remote_shell.clone().unwrap_or(defaults.remote_shell),
            jobs: args.jobs.or(self.jobs),
            dry_run: args.dry_run,
            mode,
            archiving,
            save_output_streams: self
                .save_output_streams
                .unwrap_or(defaults.save_output_streams),
            cleanup_commands: self.cleanup_commands.clone(),
            cache_path: self.cache_path.as_deref().map(paths::expand),
            cache_path_pattern: self
                .cache_path_pattern
                .clone()
                .unwrap_or(defaults.cache_path_pattern),
            emulator: defaults.emulator,
            log_level: defaults.log_level,
        };

        Ok(Resolved {
            options,
            parallel: args.parallel.or(self.parallel).unwrap_or(1).max(1),
        })
    }
}

/// `none` turns archiving off.
fn parse_archiving(value: &str) -> Result<Option<ArchiveMode>> {
    match value {
        "none" => Ok(None),
        other => match other.parse() {
            Ok(mode) => Ok(Some(mode)),
            Err(message) => bail!("{message}"),
        },
    }
}
