//! Type definitions
//!
//! A type is a directory below the type base path:
//!
//! ```text
//! __file/
//!   singleton | install | nonparallel | deprecated   marker files
//!   manifest, gencode-local, gencode-remote           optional scripts
//!   explorer/<name>                                   discovery scripts
//!   parameter/{required,required_multiple,optional,optional_multiple,boolean}
//!   parameter/default/<name>
//!   parameter/deprecated/<name>
//! ```
//!
//! Types are read once and never change afterwards; see [`TypeRegistry`](crate::TypeRegistry).

use crate::error::{Error, Result};
use crate::fsprop;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Immutable schema for one kind of operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    name: String,
    path: PathBuf,
    singleton: bool,
    install: bool,
    nonparallel: bool,
    deprecated: Option<String>,
    required: Vec<String>,
    required_multiple: Vec<String>,
    optional: Vec<String>,
    optional_multiple: Vec<String>,
    boolean: Vec<String>,
    defaults: BTreeMap<String, String>,
    deprecated_parameters: BTreeMap<String, String>,
    explorers: Vec<String>,
}

impl Type {
    /// Load a type from `base_path/name`.
    pub fn load(base_path: &Path, name: &str) -> Result<Self> {
        let path = base_path.join(name);
        if name.is_empty() || name.contains('/') || !path.is_dir() {
            return Err(Error::NoSuchType {
                name: name.to_string(),
                path,
            });
        }

        let parameter = path.join("parameter");
        let deprecated = fsprop::read_string(&path.join("deprecated"))?
            .map(|message| fsprop::strip_newline(&message).to_string());

        let ty = Self {
            name: name.to_string(),
            singleton: path.join("singleton").is_file(),
            install: path.join("install").is_file(),
            nonparallel: path.join("nonparallel").is_file(),
            deprecated,
            required: fsprop::read_lines(&parameter.join("required"))?,
            required_multiple: fsprop::read_lines(&parameter.join("required_multiple"))?,
            optional: fsprop::read_lines(&parameter.join("optional"))?,
            optional_multiple: fsprop::read_lines(&parameter.join("optional_multiple"))?,
            boolean: fsprop::read_lines(&parameter.join("boolean"))?,
            defaults: read_stripped_map(&parameter.join("default"))?,
            deprecated_parameters: read_stripped_map(&parameter.join("deprecated"))?,
            explorers: fsprop::list_dir(&path.join("explorer"))?,
            path,
        };
        log::trace!("Loaded type {} from {}", ty.name, ty.path.display());
        Ok(ty)
    }

    /// Type name, e.g. `__file`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path of the type directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// At most one object, addressed without an id.
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// Only processed in install mode.
    pub fn is_install(&self) -> bool {
        self.install
    }

    /// Objects of this type must not run concurrently on the target.
    pub fn is_nonparallel(&self) -> bool {
        self.nonparallel
    }

    /// Deprecation message, if the type is deprecated.
    pub fn deprecated(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    pub fn required_parameters(&self) -> &[String] {
        &self.required
    }

    pub fn required_multiple_parameters(&self) -> &[String] {
        &self.required_multiple
    }

    pub fn optional_parameters(&self) -> &[String] {
        &self.optional
    }

    pub fn optional_multiple_parameters(&self) -> &[String] {
        &self.optional_multiple
    }

    pub fn boolean_parameters(&self) -> &[String] {
        &self.boolean
    }

    /// Default values for optional parameters.
    pub fn parameter_defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    /// Deprecated parameters and their deprecation messages.
    pub fn deprecated_parameters(&self) -> &BTreeMap<String, String> {
        &self.deprecated_parameters
    }

    /// Whether a parameter accepts several values.
    pub fn is_multiple(&self, parameter: &str) -> bool {
        self.required_multiple.iter().any(|p| p == parameter)
            || self.optional_multiple.iter().any(|p| p == parameter)
    }

    /// Whether a parameter is a presence-only flag.
    pub fn is_boolean(&self, parameter: &str) -> bool {
        self.boolean.iter().any(|p| p == parameter)
    }

    /// Names of the discovery scripts shipped with the type.
    pub fn explorers(&self) -> &[String] {
        &self.explorers
    }

    /// Directory holding the type explorers.
    pub fn explorer_path(&self) -> PathBuf {
        self.path.join("explorer")
    }

    /// Type manifest, if the type has one.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.script("manifest")
    }

    /// Local code generator, if the type has one.
    pub fn gencode_local_path(&self) -> Option<PathBuf> {
        self.script("gencode-local")
    }

    /// Remote code generator, if the type has one.
    pub fn gencode_remote_path(&self) -> Option<PathBuf> {
        self.script("gencode-remote")
    }

    fn script(&self, name: &str) -> Option<PathBuf> {
        let path = self.path.join(name);
        path.is_file().then_some(path)
    }
}

fn read_stripped_map(dir: &Path) -> Result<BTreeMap<String, String>> {
    Ok(fsprop::read_dir_map(dir)?
        .into_iter()
        .map(|(key, value)| {
            let value = fsprop::strip_newline(&value).to_string();
            (key, value)
        })
        .collect())
}
