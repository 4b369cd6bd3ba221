//! Working directory layouts on the control node and on the target
//!
//! Local, per host below the output root:
//!
//! ```text
//! <out>/<host hash>/
//!   conf/{type,explorer,manifest,files}   merged from every conf dir
//!   explorer/                             global explorer output
//!   object/                               the object store
//!   bin/<type>                            emulator shims
//!   stdout/, stderr/                      initial manifest output
//!   messages                              inter-object messages
//!   object_marker                         marker of this run
//!   typeorder, typeorder_dep              creation order records
//! ```
//!
//! Remote, below the remote output path: `conf/type`, `conf/explorer`, `object`.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use store::fsprop;
use transport::{shell_quote, Invocation, Transport};

const CONF_SUBDIRS: [&str; 4] = ["explorer", "files", "manifest", "type"];

/// Directory name for a host below the output root.
pub fn host_dir_name(host: &str) -> String {
    let hash = blake3::hash(host.as_bytes()).to_hex();
    hash.as_str()[..32].to_string()
}

#[derive(Debug, Clone)]
pub struct LocalLayout {
    base: PathBuf,
}

impl LocalLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Layout for `host` below the output root.
    pub fn for_host(out_path: &Path, host: &str) -> Self {
        Self::new(out_path.join(host_dir_name(host)))
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn conf_path(&self) -> PathBuf {
        self.base.join("conf")
    }

    pub fn type_path(&self) -> PathBuf {
        self.conf_path().join("type")
    }

    pub fn global_explorer_path(&self) -> PathBuf {
        self.conf_path().join("explorer")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.conf_path().join("manifest")
    }

    pub fn files_path(&self) -> PathBuf {
        self.conf_path().join("files")
    }

    /// Initial manifest used when none is configured.
    pub fn default_initial_manifest(&self) -> PathBuf {
        self.manifest_path().join("init")
    }

    pub fn global_explorer_out_path(&self) -> PathBuf {
        self.base.join("explorer")
    }

    pub fn object_path(&self) -> PathBuf {
        self.base.join("object")
    }

    pub fn bin_path(&self) -> PathBuf {
        self.base.join("bin")
    }

    pub fn stdout_path(&self) -> PathBuf {
        self.base.join("stdout")
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.base.join("stderr")
    }

    pub fn messages_path(&self) -> PathBuf {
        self.base.join("messages")
    }

    pub fn object_marker_path(&self) -> PathBuf {
        self.base.join("object_marker")
    }

    pub fn typeorder_path(&self) -> PathBuf {
        self.base.join("typeorder")
    }

    pub fn typeorder_dep_path(&self) -> PathBuf {
        self.base.join("typeorder_dep")
    }

    /// Create a fresh working directory for a run.
    ///
    /// Any leftover directory from a previous run is removed first.
    pub fn create(&self, conf_dirs: &[PathBuf], emulator: &Path, marker: &str) -> Result<()> {
        if self.base.exists() {
            fs::remove_dir_all(&self.base).map_err(|e| Error::io(&self.base, e))?;
        }
        for dir in [
            self.base.clone(),
            self.global_explorer_out_path(),
            self.object_path(),
            self.bin_path(),
            self.stdout_path(),
            self.stderr_path(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        fsprop::write_string(&self.object_marker_path(), &format!("{marker}\n"))?;
        fsprop::write_string(&self.messages_path(), "")?;

        self.link_conf_dirs(conf_dirs)?;
        self.create_emulator_shims(emulator)?;
        log::debug!("Created local working directory {}", self.base.display());
        Ok(())
    }

    /// Symlink every entry of every conf dir into `conf/`.
    fn link_conf_dirs(&self, conf_dirs: &[PathBuf]) -> Result<()> {
        for sub in CONF_SUBDIRS {
            let dir = self.conf_path().join(sub);
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }

        for conf_dir in conf_dirs {
            for sub in CONF_SUBDIRS {
                let source_dir = conf_dir.join(sub);
                for entry in fsprop::list_dir(&source_dir)? {
                    let source = source_dir.join(&entry);
                    let source = fs::canonicalize(&source).map_err(|e| Error::io(&source, e))?;
                    let link = self.conf_path().join(sub).join(&entry);
                    // later conf dirs override earlier ones
                    if fs::symlink_metadata(&link).is_ok() {
                        fs::remove_file(&link).map_err(|e| Error::io(&link, e))?;
                    }
                    symlink(&source, &link)?;
                }
            }
        }
        Ok(())
    }

    /// One shim per type dispatching to the emulator.
    fn create_emulator_shims(&self, emulator: &Path) -> Result<()> {
        let emulator = shell_quote(&emulator.to_string_lossy());
        for type_name in fsprop::list_dir(&self.type_path())? {
            let shim = self.bin_path().join(&type_name);
            let script = format!(
                "#!/bin/sh\nexec {emulator} emulator {} \"$@\"\n",
                shell_quote(&type_name)
            );
            fsprop::write_string(&shim, &script)?;
            make_executable(&shim)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn symlink(source: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, link).map_err(|e| Error::io(link, e))
}

#[cfg(not(unix))]
fn symlink(source: &Path, link: &Path) -> Result<()> {
    if source.is_dir() {
        transport::copy_tree(source, link).map_err(Error::from)
    } else {
        fs::copy(source, link).map(|_| ()).map_err(|e| Error::io(link, e))
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RemoteLayout {
    base: PathBuf,
}

impl RemoteLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn conf_path(&self) -> PathBuf {
        self.base.join("conf")
    }

    pub fn type_path(&self) -> PathBuf {
        self.conf_path().join("type")
    }

    pub fn global_explorer_path(&self) -> PathBuf {
        self.conf_path().join("explorer")
    }

    pub fn object_path(&self) -> PathBuf {
        self.base.join("object")
    }

    /// Recreate the remote working directory, private to its owner.
    pub fn create(&self, remote: &dyn Transport) -> Result<()> {
        remote.rmdir(&self.base)?;
        remote.mkdir(&self.base)?;
        remote.run(
            &[
                "chmod".to_string(),
                "0700".to_string(),
                self.base.to_string_lossy().into_owned(),
            ],
            &Invocation::new(),
        )?;
        remote.mkdir(&self.conf_path())?;
        log::debug!("Created remote working directory {}", self.base.display());
        Ok(())
    }
}
