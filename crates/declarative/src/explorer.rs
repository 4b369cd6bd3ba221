//! Explorer runner: discovery scripts executed on the target

use crate::error::{Error, Result};
use crate::env;
use crate::pool;
use crate::session::Session;
use rayon::prelude::*;
use std::path::Path;
use store::{fsprop, Object, Type};
use transport::Invocation;

pub struct ExplorerRunner<'a> {
    session: &'a Session,
}

impl<'a> ExplorerRunner<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Names of the global explorers.
    pub fn list_global_explorers(&self) -> Result<Vec<String>> {
        Ok(fsprop::list_dir(&self.session.local().global_explorer_path())?)
    }

    /// Transfer and run every global explorer, saving output locally.
    pub fn run_global_explorers(&self) -> Result<()> {
        let names = self.list_global_explorers()?;
        if names.is_empty() {
            log::debug!("No global explorers");
            return Ok(());
        }
        log::info!("Running global explorers");
        self.transfer_global_explorers(&names)?;

        match self.session.options().jobs {
            Some(jobs) if jobs > 1 && names.len() > 1 => {
                let pool = pool::build(jobs)?;
                let errors: Vec<Error> = pool.install(|| {
                    names
                        .par_iter()
                        .filter_map(|name| self.run_global_explorer(name).err())
                        .collect()
                });
                Error::from_many(errors).map_or(Ok(()), Err)
            }
            _ => names.iter().try_for_each(|name| self.run_global_explorer(name)),
        }
    }

    fn transfer_global_explorers(&self, names: &[String]) -> Result<()> {
        let remote = self.session.remote().global_explorer_path();
        self.session
            .remote_exec()
            .transfer(&self.session.local().global_explorer_path(), &remote)?;
        self.make_executable(&remote, names)
    }

    fn run_global_explorer(&self, name: &str) -> Result<()> {
        let local = self.session.local();
        let remote = self.session.remote().global_explorer_path();
        // stdout is the explorer's value
        let (_, stderr) = self.session.output_files(
            &local.stdout_path().join("explorer"),
            &local.stderr_path().join("explorer"),
            name,
        );
        let mut invocation = Invocation::new().capture().log_to(None, stderr);
        invocation.env = self.session.script_env();
        invocation.env.insert(
            env::EXPLORER.to_string(),
            remote.to_string_lossy().into_owned(),
        );

        let command = [remote.join(name).to_string_lossy().into_owned()];
        let output = self.session.remote_exec().run(&command, &invocation)?;
        let out = local.global_explorer_out_path().join(name);
        fsprop::write_string(&out, &output)?;
        log::trace!("Global explorer {name} done");
        Ok(())
    }

    /// Transfer a type's explorers once per run.
    pub fn transfer_type_explorers(&self, ty: &Type) -> Result<()> {
        if ty.explorers().is_empty() || !self.session.mark_type_transferred(ty.name()) {
            return Ok(());
        }
        log::trace!("Transferring type explorers of {}", ty.name());
        let remote = self.session.remote().type_path().join(ty.name()).join("explorer");
        let result = self
            .session
            .remote_exec()
            .transfer(&ty.explorer_path(), &remote)
            .map_err(Error::from)
            .and_then(|()| self.make_executable(&remote, ty.explorers()));
        if result.is_err() {
            self.session.unmark_type_transferred(ty.name());
        }
        result
    }

    /// Transfer the object's parameters so explorers can read them.
    pub fn transfer_object_parameters(&self, object: &Object) -> Result<()> {
        if object.parameters()?.is_empty() {
            return Ok(());
        }
        let remote = self.session.remote_object_path(object).join("parameter");
        self.session
            .remote_exec()
            .transfer(&object.parameter_path(), &remote)?;
        Ok(())
    }

    /// Run every explorer of the object's type and record the output.
    pub fn run_type_explorers(&self, object: &Object, transfer_type_explorers: bool) -> Result<()> {
        let ty = object.ty();
        if ty.explorers().is_empty() {
            return Ok(());
        }
        if transfer_type_explorers {
            self.transfer_type_explorers(ty)?;
        }
        self.transfer_object_parameters(object)?;

        let explorer_dir = self.session.remote().type_path().join(ty.name()).join("explorer");
        let env = self.session.remote_object_env(object);

        for name in ty.explorers() {
            log::trace!("Running type explorer {name} for {}", object.name());
            let (_, stderr) = self.session.output_files(
                &object.stdout_path(),
                &object.stderr_path(),
                &format!("explorer-{name}"),
            );
            let mut invocation = Invocation::new().capture().log_to(None, stderr);
            invocation.env = env.clone();
            let command = [explorer_dir.join(name).to_string_lossy().into_owned()];
            let output = self.session.remote_exec().run(&command, &invocation)?;
            object.set_explorer(name, &output)?;
        }
        Ok(())
    }

    fn make_executable(&self, dir: &Path, names: &[String]) -> Result<()> {
        let mut command = vec!["chmod".to_string(), "0700".to_string()];
        command.extend(names.iter().map(|name| dir.join(name).to_string_lossy().into_owned()));
        self.session
            .remote_exec()
            .run(&command, &Invocation::new())?;
        Ok(())
    }
}
