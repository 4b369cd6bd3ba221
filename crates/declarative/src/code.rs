//! Code runner: generate code from type scripts and execute it

use crate::error::Result;
use crate::message::Messages;
use crate::session::Session;
use std::path::Path;
use store::Object;
use transport::{Invocation, Transport};

pub struct CodeRunner<'a> {
    session: &'a Session,
}

impl<'a> CodeRunner<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Output of the type's `gencode-local`, empty if it has none.
    pub fn run_gencode_local(&self, object: &Object) -> Result<String> {
        match object.ty().gencode_local_path() {
            Some(script) => self.run_gencode(object, &script, "gencode-local"),
            None => Ok(String::new()),
        }
    }

    /// Output of the type's `gencode-remote`, empty if it has none.
    pub fn run_gencode_remote(&self, object: &Object) -> Result<String> {
        match object.ty().gencode_remote_path() {
            Some(script) => self.run_gencode(object, &script, "gencode-remote"),
            None => Ok(String::new()),
        }
    }

    fn run_gencode(&self, object: &Object, script: &Path, name: &str) -> Result<String> {
        log::debug!("Running {name} of {}", object.name());
        let messages = Messages::new(&self.session.local().messages_path(), object.name())?;
        // stdout is the generated code
        let (_, stderr) = self
            .session
            .output_files(&object.stdout_path(), &object.stderr_path(), name);

        let invocation = Invocation::new()
            .capture()
            .envs(self.session.gencode_env(object))
            .envs(messages.env())
            .log_to(None, stderr);
        let code = self.session.local_exec().run_script(script, &invocation)?;
        messages.merge()?;
        Ok(code)
    }

    /// Execute the recorded local code on the control node.
    pub fn run_code_local(&self, object: &Object) -> Result<()> {
        log::debug!("Running local code of {}", object.name());
        let (stdout, stderr) = self
            .session
            .output_files(&object.stdout_path(), &object.stderr_path(), "code-local");
        let invocation = Invocation::new()
            .envs(self.session.gencode_env(object))
            .log_to(stdout, stderr);
        self.session
            .local_exec()
            .run_script(&object.code_local_path(), &invocation)?;
        Ok(())
    }

    /// Copy the recorded remote code to the target.
    pub fn transfer_code_remote(&self, object: &Object) -> Result<()> {
        let remote = self.session.remote_object_path(object);
        let remote_exec = self.session.remote_exec();
        remote_exec.mkdir(&remote)?;
        remote_exec.transfer(&object.code_remote_path(), &remote.join("code-remote"))?;
        Ok(())
    }

    /// Execute the transferred remote code on the target.
    pub fn run_code_remote(&self, object: &Object) -> Result<()> {
        log::debug!("Running remote code of {}", object.name());
        let (stdout, stderr) = self.session.output_files(
            &object.stdout_path(),
            &object.stderr_path(),
            "code-remote",
        );
        let script = self.session.remote_object_path(object).join("code-remote");
        let invocation = Invocation::new()
            .envs(self.session.remote_object_env(object))
            .log_to(stdout, stderr);
        self.session.remote_exec().run_script(&script, &invocation)?;
        Ok(())
    }
}
