//! Object store: enumeration and lookup of the objects of one run

use crate::error::{Error, Result};
use crate::lock::ObjectLock;
use crate::object::{split_name, Object};
use crate::registry::TypeRegistry;
use crate::typedef::Type;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Objects of one run below an object base directory.
///
/// Only directories carrying this run's object marker count as objects, so
/// leftovers from other runs in the same tree are ignored.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    base_path: PathBuf,
    marker: String,
    types: Arc<TypeRegistry>,
}

impl ObjectStore {
    pub fn new(
        base_path: impl Into<PathBuf>,
        marker: impl Into<String>,
        types: Arc<TypeRegistry>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            marker: marker.into(),
            types,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Look up a type through the run's registry.
    pub fn load_type(&self, name: &str) -> Result<Arc<Type>> {
        self.types.load(name)
    }

    /// Validated handle for `type_name` / `object_id`. The object may not exist yet.
    pub fn object(&self, type_name: &str, object_id: &str) -> Result<Object> {
        let ty = self.types.load(type_name)?;
        Object::new(ty, object_id, &self.base_path, &self.marker)
    }

    /// Handle for an object name such as `__file/etc/motd`.
    ///
    /// Existence is not checked.
    pub fn object_from_name(&self, name: &str) -> Result<Object> {
        let (type_name, object_id) = split_name(name);
        self.object(type_name, object_id)
    }

    /// Build a handle and create the object on disk.
    pub fn create_object(&self, type_name: &str, object_id: &str) -> Result<Object> {
        let object = self.object(type_name, object_id)?;
        object.create(false)?;
        Ok(object)
    }

    /// Names of all objects of this run, sorted.
    pub fn list_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.base_path.is_dir() {
            return Ok(names);
        }

        let mut walker = WalkDir::new(&self.base_path).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.base_path).to_path_buf();
                Error::io(path, e.into())
            })?;
            if !entry.file_type().is_dir() || entry.file_name() != self.marker.as_str() {
                continue;
            }
            // object internals never contain nested objects
            walker.skip_current_dir();

            let Some(parent) = entry.path().parent() else {
                continue;
            };
            let Ok(relative) = parent.strip_prefix(&self.base_path) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !name.is_empty() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// All objects of this run.
    pub fn list_objects(&self) -> Result<Vec<Object>> {
        self.list_names()?
            .iter()
            .map(|name| self.object_from_name(name))
            .collect()
    }

    /// Lock file guarding one object, next to its marker directory.
    pub fn lock_path(&self, object: &Object) -> PathBuf {
        object.name_path().join(format!("{}.lock", self.marker))
    }

    /// Take the exclusive lock of an object.
    pub fn lock(&self, object: &Object) -> Result<ObjectLock> {
        ObjectLock::acquire(&self.lock_path(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typedef::tests::write_type;
    use tempfile::TempDir;

    fn store(tmp: &TempDir, marker: &str) -> ObjectStore {
        let types = tmp.path().join("type");
        write_type(&types, "__file", &[]);
        write_type(&types, "__timezone", &[("singleton", "")]);
        ObjectStore::new(
            tmp.path().join("object"),
            marker,
            Arc::new(TypeRegistry::new(types)),
        )
    }

    #[test]
    fn test_list_objects() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, ".cdist-run");

        store.create_object("__file", "etc/motd").unwrap();
        store.create_object("__file", "etc").unwrap();
        store.create_object("__timezone", "").unwrap();

        assert_eq!(
            store.list_names().unwrap(),
            vec!["__file/etc", "__file/etc/motd", "__timezone"]
        );
        let objects = store.list_objects().unwrap();
        assert_eq!(objects.len(), 3);
        assert!(objects[2].ty().is_singleton());
    }

    #[test]
    fn test_list_ignores_other_markers() {
        let tmp = TempDir::new().unwrap();
        let old = store(&tmp, ".cdist-old");
        old.create_object("__file", "stale").unwrap();

        let current = store(&tmp, ".cdist-new");
        current.create_object("__file", "fresh").unwrap();

        assert_eq!(current.list_names().unwrap(), vec!["__file/fresh"]);
    }

    #[test]
    fn test_list_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, ".cdist-run");
        assert!(store.list_names().unwrap().is_empty());
    }

    #[test]
    fn test_object_from_name_validates() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, ".cdist-run");

        assert!(store.object_from_name("__file/etc/motd").is_ok());
        assert!(matches!(
            store.object_from_name("__file"),
            Err(Error::MissingObjectId { .. })
        ));
        assert!(matches!(
            store.object_from_name("__missing/x"),
            Err(Error::NoSuchType { .. })
        ));
        assert!(matches!(
            store.object_from_name("__timezone/x"),
            Err(Error::IllegalObjectId { .. })
        ));
    }

    #[test]
    fn test_lock_file_is_not_an_object() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, ".cdist-run");
        let object = store.object("__file", "etc/motd").unwrap();

        let lock = store.lock(&object).unwrap();
        assert!(lock.path().ends_with("__file/etc/motd/.cdist-run.lock"));
        drop(lock);

        assert!(store.list_names().unwrap().is_empty());
    }
}
