//! Execution on the control node

use crate::error::{Error, Result};
use crate::exec::{Invocation, Transport};
use crate::process;
use crate::target::TargetHost;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Runs commands as direct child processes of the controller.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    target: TargetHost,
    shell: String,
    base_env: BTreeMap<String, String>,
}

impl LocalTransport {
    pub fn new(target: TargetHost, shell: impl Into<String>) -> Self {
        Self {
            target,
            shell: shell.into(),
            base_env: BTreeMap::new(),
        }
    }

    /// Add a variable passed to every command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base_env.insert(key.into(), value.into());
        self
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Transport for LocalTransport {
    fn target(&self) -> &TargetHost {
        &self.target
    }

    fn run(&self, command: &[String], invocation: &Invocation) -> Result<String> {
        process::execute(command, &self.base_env, invocation)
    }

    fn run_script(&self, script: &Path, invocation: &Invocation) -> Result<String> {
        let command = [
            self.shell.clone(),
            "-e".to_string(),
            script.to_string_lossy().into_owned(),
        ];
        self.run(&command, invocation)
    }

    fn transfer(&self, source: &Path, destination: &Path) -> Result<()> {
        log::trace!(
            "Local transfer: {} -> {}",
            source.display(),
            destination.display()
        );
        if source.is_dir() {
            copy_tree(source, destination)
        } else {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
            fs::copy(source, destination)
                .map(|_| ())
                .map_err(|e| Error::io(source, e))
        }
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| Error::io(path, e))
    }

    fn rmdir(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Error::io(path, e)),
            _ => Ok(()),
        }
    }
}

/// Copy the contents of `source` into `destination`, following symlinks.
pub fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination).map_err(|e| Error::io(destination, e))?;
    for entry in WalkDir::new(source).min_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            Error::io(path, e.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::io(entry.path(), e))?;
        }
    }
    Ok(())
}
