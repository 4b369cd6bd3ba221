//! Per-object exclusive file locks
//!
//! Many emulator processes may declare objects at the same time. Each one
//! holds the lock of the object it touches for the whole read-compare-write
//! sequence. The lock is released when the guard is dropped.

use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Held exclusive lock on one lock file.
#[derive(Debug)]
pub struct ObjectLock {
    file: File,
    path: PathBuf,
}

impl ObjectLock {
    /// Block until the exclusive lock on `path` is acquired.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        flock(&file, Operation::Exclusive).map_err(|source| Error::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        log::trace!("Acquired lock {}", path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ObjectLock {
    fn drop(&mut self) {
        if let Err(e) = flock(&self.file, Operation::Unlock) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        } else {
            log::trace!("Released lock {}", self.path.display());
        }
    }
}

#[derive(Clone, Copy)]
enum Operation {
    Exclusive,
    Unlock,
}

#[cfg(unix)]
fn flock(file: &File, operation: Operation) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let op = match operation {
        Operation::Exclusive => libc::LOCK_EX,
        Operation::Unlock => libc::LOCK_UN,
    };
    loop {
        // SAFETY: flock is a standard POSIX call. The descriptor is owned by
        // `file`, which outlives this call.
        #[allow(unsafe_code)]
        let result = unsafe { libc::flock(file.as_raw_fd(), op) };
        if result == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn flock(_file: &File, _operation: Operation) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_parent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/.lock");
        let lock = ObjectLock::acquire(&path).unwrap();
        assert!(path.exists());
        assert_eq!(lock.path(), path);
    }

    #[test]
    fn test_lock_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let path = Arc::new(tmp.path().join(".lock"));
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = Arc::clone(&path);
                let inside = Arc::clone(&inside);
                let overlap = Arc::clone(&overlap);
                thread::spawn(move || {
                    // separate open file descriptions lock against each other
                    let _lock = ObjectLock::acquire(&path).unwrap();
                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlap.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(20));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }
}
