//! Error types for command execution and file transfer.

use std::io;
use std::path::PathBuf;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by local and remote transports.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The command ran and exited unsuccessfully.
    #[error("command failed ({}): {command}{}", describe_status(.status), describe_stderr(.stderr))]
    Exec {
        /// Command line as executed.
        command: String,
        /// Exit code, `None` when killed by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The command could not be started at all.
    #[error("failed to execute {command}: {source}")]
    Spawn {
        /// Command line that failed to start.
        command: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The command succeeded but its output is not valid UTF-8.
    #[error("failed to decode output of {command}")]
    Decode {
        /// Command line whose output was rejected.
        command: String,
    },

    /// Building or staging a transfer archive failed.
    #[error("failed to archive {path}: {source}")]
    Archive {
        /// Directory being archived.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Build an IO error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "killed by signal".to_string(), |code| format!("exit code {code}"))
}

fn describe_stderr(stderr: &str) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{stderr}")
    }
}
