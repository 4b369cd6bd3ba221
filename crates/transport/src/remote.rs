//! Execution on the target through external exec and copy commands
//!
//! Commands are wrapped as `<exec..> <host> /bin/sh -c '<exports; argv>'`
//! and files are copied with `<copy..> <source> <host>:<destination>`, the
//! same shape as `ssh` and `scp` expect. Every argv token reaches the target
//! as one literal word, as it does for local execution.

use crate::archive::{self, ArchiveMode, ARCHIVE_FILES_LIMIT};
use crate::error::{Error, Result};
use crate::exec::{Invocation, Transport};
use crate::process;
use crate::quote::shell_quote;
use crate::target::TargetHost;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RemoteTransport {
    target: TargetHost,
    exec: Vec<String>,
    copy: Vec<String>,
    shell: String,
    archiving: Option<ArchiveMode>,
    base_env: BTreeMap<String, String>,
    local_env: BTreeMap<String, String>,
}

impl RemoteTransport {
    /// `exec` and `copy` are command prefixes split on whitespace.
    pub fn new(target: TargetHost, exec: &str, copy: &str, shell: impl Into<String>) -> Self {
        // exec/copy wrapper scripts get to know the target too
        let local_env = target
            .env()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            exec: exec.split_whitespace().map(str::to_string).collect(),
            copy: copy.split_whitespace().map(str::to_string).collect(),
            shell: shell.into(),
            archiving: None,
            base_env: BTreeMap::new(),
            local_env,
            target,
        }
    }

    pub fn with_archiving(mut self, mode: Option<ArchiveMode>) -> Self {
        self.archiving = mode;
        self
    }

    /// Add a variable exported on the remote side for every command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base_env.insert(key.into(), value.into());
        self
    }

    /// Full local argv running `command` on the target.
    fn exec_argv(&self, command: &[String], invocation: &Invocation) -> Vec<String> {
        let mut remote = String::new();
        for (key, value) in self.base_env.iter().chain(&invocation.env) {
            remote.push_str(&format!("export {key}={};", shell_quote(value)));
        }
        let words: Vec<String> = command.iter().map(|token| shell_quote(token)).collect();
        remote.push_str(&words.join(" "));

        let mut argv = self.exec.clone();
        argv.push(self.target.host().to_string());
        argv.push("/bin/sh".to_string());
        argv.push("-c".to_string());
        argv.push(shell_quote(&remote));
        argv
    }

    fn copy_file(&self, source: &Path, destination: &Path, recursive: bool) -> Result<()> {
        let mut argv = self.copy.clone();
        if recursive {
            argv.push("-r".to_string());
        }
        argv.push(source.to_string_lossy().into_owned());
        argv.push(format!(
            "{}:{}",
            self.target.copy_host(),
            destination.display()
        ));
        process::execute(&argv, &self.local_env, &Invocation::new())?;
        Ok(())
    }

    fn transfer_archive(&self, source: &Path, destination: &Path, mode: ArchiveMode) -> Result<()> {
        let archive = archive::create(source, mode)?;
        let name = source
            .file_name()
            .map_or_else(|| "transfer".into(), |n| n.to_string_lossy().into_owned());
        let remote_archive = destination.join(format!(".{name}{}", mode.extension()));

        self.copy_file(archive.path(), &remote_archive, false)?;
        let remote_archive = remote_archive.to_string_lossy().into_owned();
        let extract = [
            "tar".to_string(),
            mode.extract_flags().to_string(),
            remote_archive.clone(),
            "-C".to_string(),
            destination.to_string_lossy().into_owned(),
        ];
        self.run(&extract, &Invocation::new())?;
        let remove = ["rm".to_string(), "-f".to_string(), remote_archive];
        self.run(&remove, &Invocation::new())?;
        Ok(())
    }
}

impl Transport for RemoteTransport {
    fn target(&self) -> &TargetHost {
        &self.target
    }

    fn run(&self, command: &[String], invocation: &Invocation) -> Result<String> {
        let argv = self.exec_argv(command, invocation);
        process::execute(&argv, &self.local_env, invocation)
    }

    fn run_script(&self, script: &Path, invocation: &Invocation) -> Result<String> {
        let mut command: Vec<String> = self.shell.split_whitespace().map(str::to_string).collect();
        command.push("-e".to_string());
        command.push(script.to_string_lossy().into_owned());
        self.run(&command, invocation)
    }

    fn transfer(&self, source: &Path, destination: &Path) -> Result<()> {
        log::trace!(
            "Remote transfer: {} -> {}:{}",
            source.display(),
            self.target.host(),
            destination.display()
        );
        if !source.is_dir() {
            return self.copy_file(source, destination, false);
        }

        self.mkdir(destination)?;
        if let Some(mode) = self.archiving
            && archive::count_files(source) > ARCHIVE_FILES_LIMIT
        {
            return self.transfer_archive(source, destination, mode);
        }

        let mut entries = fs::read_dir(source)
            .map_err(|e| Error::io(source, e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| Error::io(source, e))?;
        entries.sort();
        for entry in entries {
            self.copy_file(&entry, destination, entry.is_dir())?;
        }
        Ok(())
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        let command = [
            "mkdir".to_string(),
            "-p".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        self.run(&command, &Invocation::new()).map(|_| ())
    }

    fn rmdir(&self, path: &Path) -> Result<()> {
        let command = [
            "rm".to_string(),
            "-rf".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        self.run(&command, &Invocation::new()).map(|_| ())
    }
}
