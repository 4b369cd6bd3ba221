//! Core types for configuration runs

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use transport::ArchiveMode;

/// Which objects a run processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Skip objects of install types.
    #[default]
    Config,
    /// Process every object.
    Install,
}

/// Options for one host's run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Configuration directories, later ones override earlier ones.
    pub conf_dirs: Vec<PathBuf>,
    /// Initial manifest, defaults to `conf/manifest/init`.
    pub initial_manifest: Option<PathBuf>,
    /// Root of the local working directories, a temporary directory if unset.
    pub out_path: Option<PathBuf>,
    /// Working directory on the target.
    pub remote_out_path: PathBuf,
    /// Remote exec command prefix, e.g. `ssh -o User=root`.
    pub remote_exec: String,
    /// Remote copy command prefix, e.g. `scp -o User=root -q`.
    pub remote_copy: String,
    pub local_shell: String,
    pub remote_shell: String,
    /// Program the emulator shims dispatch to.
    pub emulator: PathBuf,
    /// Worker count for parallel passes, `None` for sequential passes.
    pub jobs: Option<usize>,
    /// Generate code without executing it.
    pub dry_run: bool,
    pub mode: RunMode,
    pub archiving: Option<ArchiveMode>,
    /// Keep stdout/stderr of every script in the object directories.
    pub save_output_streams: bool,
    /// Local commands run after convergence; the host is appended.
    pub cleanup_commands: Vec<String>,
    /// Where finished runs are kept; nothing is kept if unset.
    pub cache_path: Option<PathBuf>,
    pub cache_path_pattern: String,
    /// Level exported to scripts and emulator processes.
    pub log_level: LevelFilter,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            conf_dirs: Vec::new(),
            initial_manifest: None,
            out_path: None,
            remote_out_path: PathBuf::from("/var/lib/cdist"),
            remote_exec: "ssh -o User=root".to_string(),
            remote_copy: "scp -o User=root -q".to_string(),
            local_shell: "/bin/sh".to_string(),
            remote_shell: "/bin/sh".to_string(),
            emulator: PathBuf::from("cdist"),
            jobs: None,
            dry_run: false,
            mode: RunMode::Config,
            archiving: None,
            save_output_streams: true,
            cleanup_commands: Vec::new(),
            cache_path: None,
            cache_path_pattern: "%N".to_string(),
            log_level: LevelFilter::Warn,
        }
    }
}

impl RunOptions {
    /// Whether passes dispatch work to a worker pool.
    pub fn is_parallel(&self) -> bool {
        self.jobs.is_some_and(|jobs| jobs > 1)
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Objects processed.
    pub objects: usize,
    /// Objects whose generated code was non-empty.
    pub changed: usize,
    /// Scheduler passes until convergence.
    pub passes: usize,
    pub duration: Duration,
}

impl RunSummary {
    /// Merge another host's summary into this one
    pub fn merge(&mut self, other: &RunSummary) {
        self.objects += other.objects;
        self.changed += other.changed;
        self.passes += other.passes;
        self.duration += other.duration;
    }
}
