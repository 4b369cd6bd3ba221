//! # Transport
//!
//! Command execution and file transfer for one side of a configuration run.
//!
//! Two implementations share the [`Transport`] contract:
//!
//! - [`LocalTransport`]: spawns processes on the control node
//! - [`RemoteTransport`]: wraps commands with an external exec command
//!   (`ssh`-like) and copies files with an external copy command (`scp`-like),
//!   optionally bundling large directories into one archive
//!
//! Every call blocks until the external command exits. A non-zero exit is
//! always an error, and standard output is only decoded after the exit status
//! has been checked.

pub mod archive;
pub mod error;
mod exec;
mod local;
mod process;
mod quote;
mod remote;
mod target;

pub use archive::{ArchiveMode, ARCHIVE_FILES_LIMIT};
pub use error::{Error, Result};
pub use exec::{Invocation, Transport};
pub use local::{copy_tree, LocalTransport};
pub use quote::shell_quote;
pub use remote::RemoteTransport;
pub use target::TargetHost;
