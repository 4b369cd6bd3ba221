//! Keeping finished runs
//!
//! After a run the host's working directory is moved below the cache path,
//! to a directory named by the cache path pattern:
//!
//! - `%N` target fqdn
//! - `%h` host directory hash
//! - `%P` controller process id
//! - any other `%x` is a strftime field of the run's start time

use crate::error::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Expand a cache path pattern.
pub fn expand_pattern(
    pattern: &str,
    fqdn: &str,
    host_hash: &str,
    pid: u32,
    started: &DateTime<Local>,
) -> String {
    let mut out = String::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('N') => out.push_str(fqdn),
            Some('h') => out.push_str(host_hash),
            Some('P') => out.push_str(&pid.to_string()),
            Some(field) => {
                let directive = format!("%{field}");
                if StrftimeItems::new(&directive).any(|item| item == Item::Error) {
                    out.push_str(&directive);
                } else {
                    out.push_str(&started.format(&directive).to_string());
                }
            }
            None => out.push('%'),
        }
    }
    out
}

/// Move `source` to `destination`, replacing what was there.
pub fn save(source: &Path, destination: &Path) -> Result<PathBuf> {
    if fs::symlink_metadata(destination).is_ok() {
        fs::remove_dir_all(destination).map_err(|e| Error::io(destination, e))?;
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    match fs::rename(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            transport::copy_tree(source, destination)?;
            fs::remove_dir_all(source).map_err(|e| Error::io(source, e))?;
        }
        Err(e) => return Err(Error::io(destination, e)),
    }
    log::debug!("Saved run to {}", destination.display());
    Ok(destination.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_expand_tokens() {
        let t = started();
        assert_eq!(expand_pattern("%N", "web1.example.com", "abc", 42, &t), "web1.example.com");
        assert_eq!(expand_pattern("%h/%P", "web1", "abc", 42, &t), "abc/42");
        assert_eq!(expand_pattern("%N_%Y-%m-%d", "web1", "abc", 1, &t), "web1_2024-03-09");
        assert_eq!(expand_pattern("100%", "web1", "abc", 1, &t), "100%");
        assert_eq!(expand_pattern("a%%b", "web1", "abc", 1, &t), "a%b");
    }

    #[test]
    fn test_expand_time_fields() {
        let t = started();
        assert_eq!(expand_pattern("%H%M%S", "web1", "abc", 1, &t), "140500");
        assert_eq!(expand_pattern("%N-%H:%M", "web1", "abc", 1, &t), "web1-14:05");
    }

    #[test]
    fn test_save_replaces_previous() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("run");
        fs::create_dir_all(source.join("object")).unwrap();
        fs::write(source.join("messages"), "init:x\n").unwrap();
        let destination = tmp.path().join("cache/web1");
        fs::create_dir_all(destination.join("stale")).unwrap();

        save(&source, &destination).unwrap();
        assert!(!source.exists());
        assert!(!destination.join("stale").exists());
        assert_eq!(
            fs::read_to_string(destination.join("messages")).unwrap(),
            "init:x\n"
        );
    }
}
