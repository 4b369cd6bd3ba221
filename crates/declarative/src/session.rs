//! Per-host run state shared by the runners and the scheduler

use crate::env;
use crate::layout::{LocalLayout, RemoteLayout};
use crate::types::RunOptions;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use store::{Object, ObjectStore, TypeRegistry};
use transport::{LocalTransport, TargetHost, Transport};

/// Everything a run on one host needs: layouts, transports and the object store.
#[derive(Debug)]
pub struct Session {
    target: TargetHost,
    options: RunOptions,
    local: LocalLayout,
    remote: RemoteLayout,
    local_exec: LocalTransport,
    remote_exec: Box<dyn Transport>,
    store: ObjectStore,
    transferred_types: Mutex<HashSet<String>>,
}

impl Session {
    /// Session with a fresh object marker below `out_path`.
    pub fn new(
        target: TargetHost,
        options: RunOptions,
        out_path: &Path,
        remote_exec: Box<dyn Transport>,
    ) -> Self {
        let marker = format!(".cdist-{}", ulid::Ulid::new().to_string().to_lowercase());
        let local = LocalLayout::for_host(out_path, target.host());
        let remote = RemoteLayout::new(&options.remote_out_path);
        let local_exec = LocalTransport::new(target.clone(), options.local_shell.clone());
        let types = Arc::new(TypeRegistry::new(local.type_path()));
        let store = ObjectStore::new(local.object_path(), marker, types);

        Self {
            target,
            options,
            local,
            remote,
            local_exec,
            remote_exec,
            store,
            transferred_types: Mutex::new(HashSet::new()),
        }
    }

    pub fn target(&self) -> &TargetHost {
        &self.target
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn local(&self) -> &LocalLayout {
        &self.local
    }

    pub fn remote(&self) -> &RemoteLayout {
        &self.remote
    }

    pub fn local_exec(&self) -> &LocalTransport {
        &self.local_exec
    }

    pub fn remote_exec(&self) -> &dyn Transport {
        self.remote_exec.as_ref()
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn marker(&self) -> &str {
        self.store.marker()
    }

    /// Object directory on the target.
    pub fn remote_object_path(&self, object: &Object) -> PathBuf {
        self.remote.object_path().join(object.object_path())
    }

    /// Log files for one script, unless output streams are not kept.
    pub fn output_files(
        &self,
        stdout_dir: &Path,
        stderr_dir: &Path,
        name: &str,
    ) -> (Option<PathBuf>, Option<PathBuf>) {
        if self.options.save_output_streams {
            (Some(stdout_dir.join(name)), Some(stderr_dir.join(name)))
        } else {
            (None, None)
        }
    }

    /// Variables every script receives.
    pub fn script_env(&self) -> BTreeMap<String, String> {
        let mut vars: BTreeMap<String, String> = self
            .target
            .env()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        vars.extend(
            env::log_level_env(self.options.log_level)
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );
        if self.options.dry_run {
            vars.insert(env::DRY_RUN.to_string(), "yes".to_string());
        }
        vars
    }

    /// Environment of a manifest run, with the emulator shims on `PATH`.
    pub fn manifest_env(&self, manifest: &Path) -> BTreeMap<String, String> {
        let mut vars = self.script_env();
        let path = std::env::var("PATH").unwrap_or_default();
        vars.insert(
            "PATH".to_string(),
            format!("{}:{path}", self.local.bin_path().display()),
        );
        for (key, value) in [
            (env::TYPE_BASE_PATH, self.local.type_path()),
            (env::GLOBAL, self.local.base_path().to_path_buf()),
            (env::MANIFEST, self.local.manifest_path()),
            (env::FILES, self.local.files_path()),
            (env::CDIST_MANIFEST, manifest.to_path_buf()),
        ] {
            vars.insert(key.to_string(), value.to_string_lossy().into_owned());
        }
        vars.insert(env::OBJECT_MARKER.to_string(), self.marker().to_string());
        vars
    }

    /// Environment of a type manifest run for `object`.
    pub fn object_manifest_env(&self, object: &Object, manifest: &Path) -> BTreeMap<String, String> {
        let mut vars = self.manifest_env(manifest);
        vars.extend(object_vars(object, object.absolute_path()));
        vars
    }

    /// Environment of the gencode scripts and local code of `object`.
    pub fn gencode_env(&self, object: &Object) -> BTreeMap<String, String> {
        let mut vars = self.script_env();
        vars.insert(
            env::GLOBAL.to_string(),
            self.local.base_path().to_string_lossy().into_owned(),
        );
        vars.insert(
            env::FILES.to_string(),
            self.local.files_path().to_string_lossy().into_owned(),
        );
        vars.extend(object_vars(object, object.absolute_path()));
        vars
    }

    /// Environment of type explorers and remote code, with target-side paths.
    pub fn remote_object_env(&self, object: &Object) -> BTreeMap<String, String> {
        let mut vars = self.script_env();
        vars.extend(object_vars(object, self.remote_object_path(object)));
        let remote_type = self.remote.type_path().join(object.ty().name());
        vars.insert(
            env::EXPLORER.to_string(),
            self.remote.global_explorer_path().to_string_lossy().into_owned(),
        );
        vars.insert(
            env::TYPE_EXPLORER.to_string(),
            remote_type.join("explorer").to_string_lossy().into_owned(),
        );
        vars.insert(env::TYPE.to_string(), remote_type.to_string_lossy().into_owned());
        vars
    }

    /// Record that a type's explorers are on the target.
    ///
    /// Returns `false` if they already were.
    pub(crate) fn mark_type_transferred(&self, type_name: &str) -> bool {
        self.transferred_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_name.to_string())
    }

    pub(crate) fn unmark_type_transferred(&self, type_name: &str) {
        self.transferred_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(type_name);
    }

    pub(crate) fn is_type_transferred(&self, type_name: &str) -> bool {
        self.transferred_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(type_name)
    }
}

fn object_vars(object: &Object, object_path: PathBuf) -> [(String, String); 5] {
    [
        (
            env::OBJECT.to_string(),
            object_path.to_string_lossy().into_owned(),
        ),
        (env::OBJECT_ID.to_string(), object.object_id().to_string()),
        (env::OBJECT_NAME.to_string(), object.name().to_string()),
        (env::OBJECT_FQ.to_string(), object.name().to_string()),
        (
            env::TYPE.to_string(),
            object.ty().path().to_string_lossy().into_owned(),
        ),
    ]
}
