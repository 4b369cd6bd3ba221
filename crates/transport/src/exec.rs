//! The transport contract shared by local and remote execution.

use crate::error::Result;
use crate::target::TargetHost;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Per-call options: environment, output capture and log files.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Variables added on top of the transport's base environment.
    pub env: BTreeMap<String, String>,
    /// File receiving the command's standard output.
    pub stdout: Option<PathBuf>,
    /// File receiving the command's standard error.
    pub stderr: Option<PathBuf>,
    /// Decode and return standard output.
    pub return_output: bool,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the decoded standard output from the call.
    pub fn capture(mut self) -> Self {
        self.return_output = true;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Save standard output and standard error to the given files.
    pub fn log_to(mut self, stdout: Option<PathBuf>, stderr: Option<PathBuf>) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }
}

/// Command execution and file transfer against one side of a run.
///
/// `run` and `run_script` block until the command exits. They return the
/// decoded standard output when [`Invocation::return_output`] is set and an
/// empty string otherwise.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Host this transport acts on.
    fn target(&self) -> &TargetHost;

    fn run(&self, command: &[String], invocation: &Invocation) -> Result<String>;

    /// Run a script file with the transport's shell.
    fn run_script(&self, script: &Path, invocation: &Invocation) -> Result<String>;

    /// Copy a file or a directory tree to `destination`.
    fn transfer(&self, source: &Path, destination: &Path) -> Result<()>;

    fn mkdir(&self, path: &Path) -> Result<()>;

    fn rmdir(&self, path: &Path) -> Result<()>;
}
