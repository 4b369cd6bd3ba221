//! Type registry
//!
//! One registry per run and type base path. Every type is loaded at most once;
//! later lookups hand out the same shared instance.

use crate::error::{Error, Result};
use crate::typedef::Type;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Load-once cache of the types below one base path.
#[derive(Debug)]
pub struct TypeRegistry {
    base_path: PathBuf,
    types: Mutex<HashMap<String, Arc<Type>>>,
}

impl TypeRegistry {
    /// Create an empty registry for the given type base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            types: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding one sub-directory per type.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get a type, loading it from disk on first use.
    pub fn load(&self, name: &str) -> Result<Arc<Type>> {
        let mut types = self.types.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ty) = types.get(name) {
            return Ok(Arc::clone(ty));
        }

        let ty = Arc::new(Type::load(&self.base_path, name)?);
        types.insert(name.to_string(), Arc::clone(&ty));
        Ok(ty)
    }

    /// Names of all types below the base path, sorted.
    pub fn list_names(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.base_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.base_path, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.base_path, e))?;
            // follow symlinks: merged conf dirs link types in
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// All types below the base path.
    pub fn list(&self) -> Result<Vec<Arc<Type>>> {
        self.list_names()?
            .iter()
            .map(|name| self.load(name))
            .collect()
    }
}
