//! Run planning: which objects a pass runs together

use crate::types::RunMode;
use std::collections::HashSet;
use store::Object;

/// Whether `object` takes part in a run of the given mode.
pub fn in_mode(object: &Object, mode: RunMode) -> bool {
    match mode {
        RunMode::Install => true,
        RunMode::Config => !object.ty().is_install(),
    }
}

/// Split objects into chunks that may each run concurrently.
///
/// A chunk never holds two objects of the same nonparallel type. Order is
/// kept: a new chunk starts whenever the next object's nonparallel type is
/// already in the current one.
pub fn chunk_nonparallel(objects: Vec<Object>) -> Vec<Vec<Object>> {
    let mut chunks: Vec<Vec<Object>> = Vec::new();
    let mut current: Vec<Object> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for object in objects {
        let ty = object.ty();
        if ty.is_nonparallel() && !seen.insert(ty.name().to_string()) {
            chunks.push(std::mem::take(&mut current));
            seen.clear();
            seen.insert(ty.name().to_string());
        }
        current.push(object);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::fixture;

    fn names(chunk: &[Object]) -> Vec<&str> {
        chunk.iter().map(Object::name).collect()
    }

    #[test]
    fn test_chunks_serialise_nonparallel_types() {
        let f = fixture();
        f.write_type("__package", &[("nonparallel", "")]);
        f.write_type("__file", &[]);
        f.scaffold();
        let store = f.session.store();

        let objects = vec![
            store.create_object("__package", "vim").unwrap(),
            store.create_object("__file", "a").unwrap(),
            store.create_object("__file", "b").unwrap(),
            store.create_object("__package", "git").unwrap(),
            store.create_object("__package", "zsh").unwrap(),
        ];
        let chunks = chunk_nonparallel(objects);

        assert_eq!(chunks.len(), 3);
        assert_eq!(names(&chunks[0]), vec!["__package/vim", "__file/a", "__file/b"]);
        assert_eq!(names(&chunks[1]), vec!["__package/git"]);
        assert_eq!(names(&chunks[2]), vec!["__package/zsh"]);
    }

    #[test]
    fn test_chunks_without_nonparallel_types() {
        let f = fixture();
        f.write_type("__file", &[]);
        f.scaffold();
        let store = f.session.store();

        let objects = vec![
            store.create_object("__file", "a").unwrap(),
            store.create_object("__file", "b").unwrap(),
        ];
        assert_eq!(chunk_nonparallel(objects).len(), 1);
        assert!(chunk_nonparallel(Vec::new()).is_empty());
    }

    #[test]
    fn test_install_types_skipped_in_config_mode() {
        let f = fixture();
        f.write_type("__install_disk", &[("install", "")]);
        f.write_type("__file", &[]);
        f.scaffold();
        let store = f.session.store();

        let disk = store.create_object("__install_disk", "sda").unwrap();
        let file = store.create_object("__file", "a").unwrap();
        assert!(!in_mode(&disk, RunMode::Config));
        assert!(in_mode(&disk, RunMode::Install));
        assert!(in_mode(&file, RunMode::Config));
    }
}
