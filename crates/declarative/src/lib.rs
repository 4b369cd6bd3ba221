//! # Declarative
//!
//! Convergence engine: manifests declare objects, the scheduler resolves
//! their dependencies and runs the code their types generate until every
//! object is done.
//!
//! ## Core Concepts
//!
//! - **Session**: layouts, transports and object store of one host's run
//! - **Emulator**: turns a type invocation in a manifest into an object
//! - **Runners**: explorers, manifests and code, one external script per call
//! - **Scheduler**: repeated passes until no object changes state
//! - **ConfigRun**: scaffolding, global explorers, initial manifest,
//!   convergence, cleanup and cache for one host
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ConfigRun, NoProgress, RunOptions};
//! use transport::TargetHost;
//!
//! let options = RunOptions {
//!     conf_dirs: vec!["/srv/cdist/conf".into()],
//!     jobs: Some(4),
//!     ..RunOptions::default()
//! };
//! let run = ConfigRun::new(TargetHost::new("web1.example.com"), options)?;
//! let summary = run.run(&mut NoProgress)?;
//! println!("{} objects, {} changed", summary.objects, summary.changed);
//! ```
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: receives progress updates from the controlling thread
//! - [`transport::Transport`]: the target side of a run, replaceable for tests

pub mod cache;
mod code;
pub mod context;
pub mod emulator;
pub mod env;
pub mod error;
mod explorer;
pub mod layout;
mod manifest;
mod message;
pub mod planner;
mod pool;
pub mod resolver;
mod run;
mod scheduler;
mod session;
pub mod types;

pub use code::CodeRunner;
pub use context::{NoProgress, ProgressCallback};
pub use emulator::{Emulator, EmulatorEnv};
pub use error::{Error, InitialManifestError, ObjectError, Result};
pub use explorer::ExplorerRunner;
pub use layout::{LocalLayout, RemoteLayout};
pub use manifest::ManifestRunner;
pub use message::Messages;
pub use run::ConfigRun;
pub use scheduler::Scheduler;
pub use session::Session;
pub use types::{RunMode, RunOptions, RunSummary};
