//! Manifest runner: the initial manifest and type manifests

use crate::error::Result;
use crate::message::Messages;
use crate::session::Session;
use std::path::Path;
use store::Object;
use transport::{Invocation, Transport};

pub struct ManifestRunner<'a> {
    session: &'a Session,
}

impl<'a> ManifestRunner<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Run the initial manifest, which declares the first objects.
    pub fn run_initial_manifest(&self, manifest: &Path) -> Result<()> {
        log::info!("Running initial manifest {}", manifest.display());
        let local = self.session.local();
        let messages = Messages::new(&local.messages_path(), "init")?;
        let (stdout, stderr) =
            self.session
                .output_files(&local.stdout_path(), &local.stderr_path(), "init");

        let invocation = Invocation::new()
            .envs(self.session.manifest_env(manifest))
            .envs(messages.env())
            .log_to(stdout, stderr);
        self.session.local_exec().run_script(manifest, &invocation)?;
        messages.merge()
    }

    /// Run the type manifest of `object`, if its type has one.
    pub fn run_type_manifest(&self, object: &Object) -> Result<()> {
        let Some(manifest) = object.ty().manifest_path() else {
            return Ok(());
        };
        log::debug!("Running type manifest of {}", object.name());
        let messages = Messages::new(&self.session.local().messages_path(), object.name())?;
        let (stdout, stderr) =
            self.session
                .output_files(&object.stdout_path(), &object.stderr_path(), "manifest");

        let invocation = Invocation::new()
            .envs(self.session.object_manifest_env(object, &manifest))
            .envs(messages.env())
            .log_to(stdout, stderr);
        self.session.local_exec().run_script(&manifest, &invocation)?;
        messages.merge()
    }
}
