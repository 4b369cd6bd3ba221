//! Fixpoint scheduler
//!
//! Objects advance `Undef -> Prepared -> Done` over repeated passes:
//!
//! - an undefined object is prepared (type explorers, then type manifest)
//!   once every object its requirements match is done;
//! - a prepared object is run (gencode, then code) once every object in its
//!   autorequire list is done.
//!
//! Preparing an object may declare new objects, which the next pass picks
//! up by listing the store again. Passes repeat until one changes nothing.
//! Objects left unfinished at that point are reported with their
//! outstanding requirements; a dependency cycle shows up the same way.

use crate::code::CodeRunner;
use crate::context::ProgressCallback;
use crate::error::{Error, Result};
use crate::explorer::ExplorerRunner;
use crate::manifest::ManifestRunner;
use crate::planner;
use crate::pool::{self, Operation, Task};
use crate::resolver;
use crate::session::Session;
use rayon::ThreadPool;
use std::collections::{BTreeSet, HashSet};
use store::{Object, ObjectState};

pub struct Scheduler<'a> {
    session: &'a Session,
    explorers: ExplorerRunner<'a>,
    manifests: ManifestRunner<'a>,
    code: CodeRunner<'a>,
    pool: Option<ThreadPool>,
}

impl<'a> Scheduler<'a> {
    pub fn new(session: &'a Session) -> Result<Self> {
        let pool = match session.options().jobs {
            Some(jobs) if jobs > 1 => Some(pool::build(jobs)?),
            _ => None,
        };
        Ok(Self {
            session,
            explorers: ExplorerRunner::new(session),
            manifests: ManifestRunner::new(session),
            code: CodeRunner::new(session),
            pool,
        })
    }

    /// Objects this run processes.
    pub fn object_list(&self) -> Result<Vec<Object>> {
        let mode = self.session.options().mode;
        Ok(self
            .session
            .store()
            .list_objects()?
            .into_iter()
            .filter(|object| {
                let keep = planner::in_mode(object, mode);
                if !keep {
                    log::debug!("Skipping install object {}", object.name());
                }
                keep
            })
            .collect())
    }

    /// Run explorers and manifest of one object.
    pub fn object_prepare(&self, object: &Object, transfer_type_explorers: bool) -> Result<()> {
        self.prepare(object, transfer_type_explorers)
            .map_err(|e| e.for_object(object))
    }

    fn prepare(&self, object: &Object, transfer_type_explorers: bool) -> Result<()> {
        log::debug!("Preparing {}", object.name());
        self.explorers
            .run_type_explorers(object, transfer_type_explorers)?;
        self.manifests.run_type_manifest(object)?;
        object.set_state(ObjectState::Prepared)?;
        object.cleanup()?;
        Ok(())
    }

    /// Generate and execute the code of one object.
    ///
    /// Returns whether any code was generated.
    pub fn object_run(&self, object: &Object) -> Result<bool> {
        self.run(object).map_err(|e| e.for_object(object))
    }

    fn run(&self, object: &Object) -> Result<bool> {
        if object.state()? == ObjectState::Done {
            return Err(Error::AlreadyDone(object.name().to_string()));
        }
        log::debug!("Running {}", object.name());

        let code_local = self.code.run_gencode_local(object)?;
        let code_remote = self.code.run_gencode_remote(object)?;
        object.set_code_local(&code_local)?;
        object.set_code_remote(&code_remote)?;
        let changed = !code_local.is_empty() || !code_remote.is_empty();
        object.set_changed(changed)?;
        if changed {
            log::info!("Processing {}", object.name());
        }

        if self.session.options().dry_run {
            log::debug!("Dry run, skipping code of {}", object.name());
        } else {
            if !code_local.is_empty() {
                self.code.run_code_local(object)?;
            }
            if !code_remote.is_empty() {
                self.code.transfer_code_remote(object)?;
                self.code.run_code_remote(object)?;
            }
        }

        object.set_state(ObjectState::Done)?;
        Ok(changed)
    }

    /// Run passes until nothing changes.
    ///
    /// Returns the number of passes, including the final idle one.
    pub fn iterate_until_finished(&self, progress: &mut dyn ProgressCallback) -> Result<usize> {
        let mut passes = 0;
        loop {
            passes += 1;
            progress.on_pass_start(passes);
            log::debug!("Pass {passes}");
            let changed = if self.pool.is_some() {
                self.iterate_once_parallel(progress)?
            } else {
                self.iterate_once(progress)?
            };
            if !changed {
                break;
            }
        }
        self.check_finished()?;
        Ok(passes)
    }

    /// One sequential pass. Returns whether any object changed state.
    pub fn iterate_once(&self, progress: &mut dyn ProgressCallback) -> Result<bool> {
        let objects = self.object_list()?;
        let names = object_names(&objects);
        let mut done = done_names(&objects)?;
        let mut changed = false;

        for object in &objects {
            if !resolver::unfinished(&object.requirements()?, &names, &done).is_satisfied() {
                continue;
            }
            if object.state()? == ObjectState::Undef {
                self.object_prepare(object, true)?;
                progress.on_object_prepared(object.name());
                changed = true;
            }

            if !resolver::unfinished(&object.autorequire()?, &names, &done).is_satisfied() {
                continue;
            }
            if object.state()? == ObjectState::Prepared {
                let object_changed = self.object_run(object)?;
                done.insert(object.name().to_string());
                progress.on_object_done(object.name(), object_changed);
                changed = true;
            }
        }
        Ok(changed)
    }

    /// One pass with preparation and code runs spread over the worker pool.
    pub fn iterate_once_parallel(&self, progress: &mut dyn ProgressCallback) -> Result<bool> {
        let Some(pool) = &self.pool else {
            return self.iterate_once(progress);
        };
        let mut changed = false;

        let objects = self.object_list()?;
        let names = object_names(&objects);
        let done = done_names(&objects)?;
        let mut to_prepare = Vec::new();
        for object in objects {
            if object.state()? == ObjectState::Undef
                && resolver::unfinished(&object.requirements()?, &names, &done).is_satisfied()
            {
                to_prepare.push(object);
            }
        }

        if !to_prepare.is_empty() {
            log::debug!("Preparing {} objects in parallel", to_prepare.len());
            self.transfer_type_explorers(pool, &to_prepare)?;

            let tasks = to_prepare
                .iter()
                .map(|object| Task::new(object.name(), Operation::Prepare))
                .collect();
            let outcomes = pool::dispatch(pool, tasks, |task| {
                let object = self.session.store().object_from_name(&task.name)?;
                self.object_prepare(&object, false)
            });
            let mut errors = Vec::new();
            for outcome in outcomes {
                match outcome.result {
                    Ok(()) => progress.on_object_prepared(&outcome.task.name),
                    Err(e) => errors.push(e),
                }
            }
            if let Some(error) = Error::from_many(errors) {
                return Err(error);
            }
            changed = true;
        }

        // preparation may have declared new objects
        let objects = self.object_list()?;
        let names = object_names(&objects);
        let done = done_names(&objects)?;
        let mut to_run = Vec::new();
        for object in objects {
            if object.state()? == ObjectState::Prepared
                && resolver::unfinished(&object.autorequire()?, &names, &done).is_satisfied()
            {
                to_run.push(object);
            }
        }

        if !to_run.is_empty() {
            log::debug!("Running {} objects in parallel", to_run.len());
            for chunk in planner::chunk_nonparallel(to_run) {
                let tasks = chunk
                    .iter()
                    .map(|object| Task::new(object.name(), Operation::Run))
                    .collect();
                let outcomes = pool::dispatch(pool, tasks, |task| {
                    let object = self.session.store().object_from_name(&task.name)?;
                    self.object_run(&object).map(|_| ())
                });
                let mut errors = Vec::new();
                for outcome in outcomes {
                    match outcome.result {
                        Ok(()) => {
                            let object = self.session.store().object_from_name(&outcome.task.name)?;
                            progress.on_object_done(object.name(), object.changed());
                        }
                        Err(e) => errors.push(e),
                    }
                }
                if let Some(error) = Error::from_many(errors) {
                    return Err(error);
                }
            }
            changed = true;
        }

        Ok(changed)
    }

    /// Transfer each distinct type's explorers once, in parallel if several.
    fn transfer_type_explorers(&self, pool: &ThreadPool, objects: &[Object]) -> Result<()> {
        let types: BTreeSet<&str> = objects
            .iter()
            .map(Object::ty)
            .filter(|ty| !ty.explorers().is_empty())
            .map(|ty| ty.name())
            .collect();

        if types.len() <= 1 {
            for object in objects {
                self.explorers.transfer_type_explorers(object.ty())?;
            }
            return Ok(());
        }

        let tasks = types
            .iter()
            .map(|name| Task::new(*name, Operation::TransferExplorers))
            .collect();
        let outcomes = pool::dispatch(pool, tasks, |task| {
            let ty = self.session.store().load_type(&task.name)?;
            self.explorers.transfer_type_explorers(&ty)
        });
        let errors = outcomes.into_iter().filter_map(|o| o.result.err()).collect();
        Error::from_many(errors).map_or(Ok(()), Err)
    }

    /// Fail if any object is left unfinished after the last pass.
    fn check_finished(&self) -> Result<()> {
        let objects = self.object_list()?;
        let names = object_names(&objects);
        let done = done_names(&objects)?;

        let mut unfinished = Vec::new();
        let mut report = Vec::new();
        for object in &objects {
            if done.contains(object.name()) {
                continue;
            }
            let requirements = resolver::unfinished(&object.requirements()?, &names, &done);
            let autorequire = resolver::unfinished(&object.autorequire()?, &names, &done);
            if let Some(pattern) = requirements
                .unmatched
                .first()
                .or_else(|| autorequire.unmatched.first())
            {
                return Err(Error::RequirementNotFound {
                    object: object.name().to_string(),
                    pattern: pattern.clone(),
                });
            }

            report.push(format!(
                "{name} requires:\n        {}\n{name} autorequires:\n        {}",
                requirements.pending.join("\n        "),
                autorequire.pending.join("\n        "),
                name = object.name(),
            ));
            unfinished.push(object.name().to_string());
        }

        if unfinished.is_empty() {
            return Ok(());
        }
        Err(Error::Unresolvable {
            objects: unfinished,
            report: report.join("\n"),
        })
    }
}

fn object_names(objects: &[Object]) -> Vec<String> {
    objects.iter().map(|o| o.name().to_string()).collect()
}

fn done_names(objects: &[Object]) -> Result<HashSet<String>> {
    let mut done = HashSet::new();
    for object in objects {
        if object.state()? == ObjectState::Done {
            done.insert(object.name().to_string());
        }
    }
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RecordingProgress;
    use crate::session::tests::{fixture, fixture_with, Fixture};
    use crate::types::{RunMode, RunOptions};
    use std::fs;
    use std::path::Path;

    /// A type whose local code appends the object name to `log`.
    fn logging_type(f: &Fixture, name: &str, log: &Path, extra: &[(&str, &str)]) {
        let gencode = format!(
            "echo \"echo \\\"\\$__object_name\\\" >> '{}'\"\n",
            log.display()
        );
        let mut files = vec![("gencode-local", gencode.as_str())];
        files.extend_from_slice(extra);
        f.write_type(name, &files);
    }

    fn run_log(log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn chain(f: &Fixture, log: &Path) {
        for name in ["__first", "__second", "__third"] {
            logging_type(f, name, log, &[]);
        }
        f.scaffold();
        let store = f.session.store();
        store.create_object("__first", "man").unwrap();
        store
            .create_object("__second", "on-the")
            .unwrap()
            .add_requirement("__first/man")
            .unwrap();
        store
            .create_object("__third", "moon")
            .unwrap()
            .add_requirement("__second/on-the")
            .unwrap();
    }

    #[test]
    fn test_requirement_chain() {
        let f = fixture();
        let log = f.tmp.path().join("log");
        chain(&f, &log);

        let scheduler = Scheduler::new(&f.session).unwrap();
        let mut progress = RecordingProgress::default();
        let passes = scheduler.iterate_until_finished(&mut progress).unwrap();

        assert_eq!(run_log(&log), vec!["__first/man", "__second/on-the", "__third/moon"]);
        assert_eq!(progress.done.len(), 3);
        assert!(passes >= 2);
        for object in scheduler.object_list().unwrap() {
            assert_eq!(object.state().unwrap(), ObjectState::Done);
            assert!(object.changed());
        }
    }

    #[test]
    fn test_requirement_chain_parallel() {
        let f = fixture_with(RunOptions {
            jobs: Some(4),
            ..RunOptions::default()
        });
        let log = f.tmp.path().join("log");
        chain(&f, &log);

        let scheduler = Scheduler::new(&f.session).unwrap();
        let mut progress = RecordingProgress::default();
        scheduler.iterate_until_finished(&mut progress).unwrap();

        assert_eq!(run_log(&log), vec!["__first/man", "__second/on-the", "__third/moon"]);
        assert_eq!(progress.prepared.len(), 3);
        assert_eq!(progress.done.len(), 3);
    }

    #[test]
    fn test_convergence_is_idempotent() {
        let f = fixture();
        let log = f.tmp.path().join("log");
        chain(&f, &log);

        let scheduler = Scheduler::new(&f.session).unwrap();
        scheduler
            .iterate_until_finished(&mut RecordingProgress::default())
            .unwrap();

        let mut again = RecordingProgress::default();
        assert_eq!(scheduler.iterate_until_finished(&mut again).unwrap(), 1);
        assert!(again.prepared.is_empty());
        assert!(again.done.is_empty());
        assert_eq!(run_log(&log).len(), 3);
    }

    #[test]
    fn test_autorequire_runs_children_first() {
        let f = fixture();
        let log = f.tmp.path().join("log");
        for name in ["__a_parent", "__b_child", "__c_dependent"] {
            logging_type(&f, name, &log, &[]);
        }
        f.scaffold();
        let store = f.session.store();
        let parent = store.create_object("__a_parent", "x").unwrap();
        store.create_object("__b_child", "x").unwrap();
        parent.add_autorequire("__b_child/x").unwrap();
        store
            .create_object("__c_dependent", "x")
            .unwrap()
            .add_requirement("__a_parent/x")
            .unwrap();

        Scheduler::new(&f.session)
            .unwrap()
            .iterate_until_finished(&mut RecordingProgress::default())
            .unwrap();
        assert_eq!(
            run_log(&log),
            vec!["__b_child/x", "__a_parent/x", "__c_dependent/x"]
        );
    }

    #[test]
    fn test_cycle_is_reported() {
        let f = fixture();
        for name in ["__a", "__b", "__c", "__free"] {
            f.write_type(name, &[]);
        }
        f.scaffold();
        let store = f.session.store();
        for (name, requires) in [("__a", "__b/x"), ("__b", "__c/x"), ("__c", "__a/x")] {
            store
                .create_object(name, "x")
                .unwrap()
                .add_requirement(requires)
                .unwrap();
        }
        store.create_object("__free", "x").unwrap();

        let err = Scheduler::new(&f.session)
            .unwrap()
            .iterate_until_finished(&mut RecordingProgress::default())
            .unwrap_err();
        match &err {
            Error::Unresolvable { objects, report } => {
                assert_eq!(objects, &vec!["__a/x", "__b/x", "__c/x"]);
                assert!(report.contains("__a/x requires:\n        __b/x\n__a/x autorequires:\n"));
            }
            other => panic!("unexpected: {other}"),
        }
        assert!(err.to_string().starts_with("The requirements of the following objects"));
        assert_eq!(
            store.object("__free", "x").unwrap().state().unwrap(),
            ObjectState::Done
        );
    }

    #[test]
    fn test_missing_requirement() {
        let f = fixture();
        f.write_type("__file", &[]);
        f.scaffold();
        f.session
            .store()
            .create_object("__file", "a")
            .unwrap()
            .add_requirement("__file/nope")
            .unwrap();

        let err = Scheduler::new(&f.session)
            .unwrap()
            .iterate_until_finished(&mut RecordingProgress::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::RequirementNotFound { ref pattern, .. } if pattern == "__file/nope"
        ));
    }

    #[test]
    fn test_glob_requirement_waits_for_all_matches() {
        let f = fixture();
        let log = f.tmp.path().join("log");
        logging_type(&f, "__file", &log, &[]);
        logging_type(&f, "__service", &log, &[]);
        f.scaffold();
        let store = f.session.store();
        store
            .create_object("__service", "web")
            .unwrap()
            .add_requirement("__file/etc/*")
            .unwrap();
        store.create_object("__file", "etc/a").unwrap();
        store.create_object("__file", "etc/b").unwrap();

        Scheduler::new(&f.session)
            .unwrap()
            .iterate_until_finished(&mut RecordingProgress::default())
            .unwrap();
        assert_eq!(run_log(&log).last().unwrap(), "__service/web");
    }

    #[test]
    fn test_dry_run_generates_without_executing() {
        let f = fixture_with(RunOptions {
            dry_run: true,
            ..RunOptions::default()
        });
        let log = f.tmp.path().join("log");
        logging_type(&f, "__file", &log, &[]);
        f.scaffold();
        let object = f.session.store().create_object("__file", "a").unwrap();

        Scheduler::new(&f.session)
            .unwrap()
            .iterate_until_finished(&mut RecordingProgress::default())
            .unwrap();
        assert!(!log.exists());
        assert!(object.code_local().unwrap().contains("__object_name"));
        assert_eq!(object.state().unwrap(), ObjectState::Done);
    }

    #[test]
    fn test_config_mode_skips_install_types() {
        let f = fixture_with(RunOptions {
            mode: RunMode::Config,
            ..RunOptions::default()
        });
        f.write_type("__install_disk", &[("install", "")]);
        f.write_type("__file", &[]);
        f.scaffold();
        let store = f.session.store();
        let disk = store.create_object("__install_disk", "sda").unwrap();
        store.create_object("__file", "a").unwrap();

        let scheduler = Scheduler::new(&f.session).unwrap();
        assert_eq!(scheduler.object_list().unwrap().len(), 1);
        scheduler
            .iterate_until_finished(&mut RecordingProgress::default())
            .unwrap();
        assert_eq!(disk.state().unwrap(), ObjectState::Undef);
    }

    #[test]
    fn test_run_twice_fails() {
        let f = fixture();
        f.write_type("__file", &[]);
        f.scaffold();
        let object = f.session.store().create_object("__file", "a").unwrap();

        let scheduler = Scheduler::new(&f.session).unwrap();
        scheduler.object_prepare(&object, true).unwrap();
        assert!(!scheduler.object_run(&object).unwrap());
        let err = scheduler.object_run(&object).unwrap_err();
        match err {
            Error::Object(inner) => assert!(matches!(inner.error, Error::AlreadyDone(_))),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_parallel_failures_are_collected() {
        let f = fixture_with(RunOptions {
            jobs: Some(2),
            ..RunOptions::default()
        });
        f.write_type("__broken", &[("gencode-remote", "echo failing >&2\nexit 1\n")]);
        f.scaffold();
        let store = f.session.store();
        store.create_object("__broken", "a").unwrap();
        store.create_object("__broken", "b").unwrap();

        let err = Scheduler::new(&f.session)
            .unwrap()
            .iterate_until_finished(&mut RecordingProgress::default())
            .unwrap_err();
        match err {
            Error::Parallel(errors) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].to_string().contains("---- BEGIN stderr:gencode-remote ----"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_nonparallel_type_in_parallel_pass() {
        let f = fixture_with(RunOptions {
            jobs: Some(4),
            ..RunOptions::default()
        });
        let log = f.tmp.path().join("log");
        logging_type(&f, "__package", &log, &[("nonparallel", "")]);
        f.scaffold();
        let store = f.session.store();
        for id in ["git", "vim", "zsh"] {
            store.create_object("__package", id).unwrap();
        }

        Scheduler::new(&f.session)
            .unwrap()
            .iterate_until_finished(&mut RecordingProgress::default())
            .unwrap();
        assert_eq!(run_log(&log), vec!["__package/git", "__package/vim", "__package/zsh"]);
    }
}
