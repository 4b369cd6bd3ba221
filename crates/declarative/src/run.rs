//! One configuration run against one host

use crate::cache;
use crate::context::ProgressCallback;
use crate::error::{Error, InitialManifestError, Result};
use crate::explorer::ExplorerRunner;
use crate::layout::host_dir_name;
use crate::manifest::ManifestRunner;
use crate::scheduler::Scheduler;
use crate::session::Session;
use crate::types::{RunOptions, RunSummary};
use chrono::Local;
use std::path::PathBuf;
use std::time::Instant;
use store::fsprop;
use tempfile::TempDir;
use transport::{Invocation, RemoteTransport, TargetHost, Transport};

pub struct ConfigRun {
    session: Session,
    // keeps a temporary output root alive for the run
    _out_dir: Option<TempDir>,
}

impl ConfigRun {
    /// Run against `target` over the configured remote exec and copy commands.
    pub fn new(target: TargetHost, options: RunOptions) -> Result<Self> {
        let remote = RemoteTransport::new(
            target.clone(),
            &options.remote_exec,
            &options.remote_copy,
            options.remote_shell.clone(),
        )
        .with_archiving(options.archiving);
        Self::with_remote(target, options, Box::new(remote))
    }

    /// Run with a caller-supplied transport for the target side.
    pub fn with_remote(
        target: TargetHost,
        options: RunOptions,
        remote: Box<dyn Transport>,
    ) -> Result<Self> {
        let (out_path, out_dir) = match &options.out_path {
            Some(path) => (path.clone(), None),
            None => {
                let dir = TempDir::new().map_err(|e| Error::io(std::env::temp_dir(), e))?;
                (dir.path().to_path_buf(), Some(dir))
            }
        };
        Ok(Self {
            session: Session::new(target, options, &out_path, remote),
            _out_dir: out_dir,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Converge the host.
    pub fn run(&self, progress: &mut dyn ProgressCallback) -> Result<RunSummary> {
        let started = Instant::now();
        let started_at = Local::now();
        let session = &self.session;
        let options = session.options();
        log::info!("Starting configuration run on {}", session.target().host());

        session
            .local()
            .create(&options.conf_dirs, &options.emulator, session.marker())?;
        session.remote().create(session.remote_exec())?;

        ExplorerRunner::new(session).run_global_explorers()?;
        self.run_initial_manifest()?;

        let scheduler = Scheduler::new(session)?;
        let passes = scheduler.iterate_until_finished(progress)?;

        self.run_cleanup_commands();
        fsprop::remove_file(&session.local().typeorder_dep_path())?;

        let objects = scheduler.object_list()?;
        let summary = RunSummary {
            objects: objects.len(),
            changed: objects.iter().filter(|object| object.changed()).count(),
            passes,
            duration: started.elapsed(),
        };

        if !options.dry_run {
            self.save_cache(&started_at)?;
        }
        log::info!(
            "Finished run on {} in {:.2}s",
            session.target().host(),
            summary.duration.as_secs_f64()
        );
        Ok(summary)
    }

    fn run_initial_manifest(&self) -> Result<()> {
        let local = self.session.local();
        let manifest = self
            .session
            .options()
            .initial_manifest
            .clone()
            .unwrap_or_else(|| local.default_initial_manifest());

        ManifestRunner::new(&self.session)
            .run_initial_manifest(&manifest)
            .map_err(|error| {
                Error::InitialManifest(Box::new(InitialManifestError::new(
                    &manifest,
                    &local.stdout_path().join("init"),
                    &local.stderr_path().join("init"),
                    error,
                )))
            })
    }

    /// Run each cleanup command with the host appended. Failures are logged.
    fn run_cleanup_commands(&self) {
        let host = self.session.target().host();
        for command in &self.session.options().cleanup_commands {
            let mut argv: Vec<String> = command.split_whitespace().map(str::to_string).collect();
            if argv.is_empty() {
                continue;
            }
            argv.push(host.to_string());
            log::debug!("Running cleanup command: {}", argv.join(" "));
            if let Err(e) = self.session.local_exec().run(&argv, &Invocation::new()) {
                log::warn!("Cleanup command failed: {e}");
            }
        }
    }

    fn save_cache(&self, started_at: &chrono::DateTime<Local>) -> Result<Option<PathBuf>> {
        let options = self.session.options();
        let Some(cache_path) = &options.cache_path else {
            return Ok(None);
        };
        let target = self.session.target();
        let name = cache::expand_pattern(
            &options.cache_path_pattern,
            target.fqdn(),
            &host_dir_name(target.host()),
            std::process::id(),
            started_at,
        );
        let saved = cache::save(self.session.local().base_path(), &cache_path.join(name))?;
        Ok(Some(saved))
    }
}
