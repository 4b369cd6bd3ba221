//! File-backed properties
//!
//! Every mutable field of an object lives in its own file (or directory of
//! files). These helpers are the only place that touches those files, so
//! reads always hit the disk and a missing file reads as "empty".

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Read a whole file, `None` if it does not exist.
pub fn read_string(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Replace a file's content.
pub fn write_string(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| Error::io(path, e))
}

/// Read a newline separated list, skipping blank lines.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    Ok(read_string(path)?
        .map(|content| {
            content
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

/// Append one entry to a list file, creating it if needed.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    writeln!(file, "{line}").map_err(|e| Error::io(path, e))
}

/// Append an entry unless the list already contains it.
///
/// Returns `true` if the entry was added.
/// Not atomic; concurrent writers serialise on the owning object's lock.
pub fn append_unique(path: &Path, line: &str) -> Result<bool> {
    if read_lines(path)?.iter().any(|existing| existing == line) {
        return Ok(false);
    }
    append_line(path, line)?;
    Ok(true)
}

/// Presence-only flag file.
pub fn read_flag(path: &Path) -> bool {
    path.is_file()
}

/// Create or remove a presence-only flag file.
pub fn write_flag(path: &Path, value: bool) -> Result<()> {
    if value {
        write_string(path, "")
    } else {
        remove_file(path)
    }
}

/// Remove a file, ignoring a missing one.
pub fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Read every file of a directory into a map keyed by file name.
pub fn read_dir_map(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(map),
        Err(e) => return Err(Error::io(dir, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        map.insert(entry.file_name().to_string_lossy().into_owned(), content);
    }
    Ok(map)
}

/// List the file names of a directory, sorted. Missing directory is empty.
pub fn list_dir(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Drop a single trailing newline, as written by shell `echo`.
pub fn strip_newline(value: &str) -> &str {
    value.strip_suffix('\n').unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_read_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent");

        assert_eq!(read_string(&path).unwrap(), None);
        assert!(read_lines(&path).unwrap().is_empty());
        assert!(read_dir_map(&path).unwrap().is_empty());
        assert!(!read_flag(&path));
    }

    #[test]
    fn test_lines_preserve_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("require");

        append_line(&path, "__b/two").unwrap();
        append_line(&path, "__a/one").unwrap();
        assert!(!append_unique(&path, "__b/two").unwrap());
        assert!(append_unique(&path, "__c/three").unwrap());

        assert_eq!(read_lines(&path).unwrap(), vec!["__b/two", "__a/one", "__c/three"]);
    }

    #[test]
    fn test_flag_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("changed");

        write_flag(&path, true).unwrap();
        assert!(read_flag(&path));
        write_flag(&path, false).unwrap();
        assert!(!read_flag(&path));
        // removing twice is fine
        write_flag(&path, false).unwrap();
    }

    #[test]
    fn test_strip_newline_only_once() {
        assert_eq!(strip_newline("value\n"), "value");
        assert_eq!(strip_newline("value\n\n"), "value\n");
        assert_eq!(strip_newline("value"), "value");
    }
}
