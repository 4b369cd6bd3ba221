//! Error types for the convergence engine.
//!
//! Lower layers surface through [`Error::Store`] and [`Error::Transport`].
//! Failures while preparing or running an object are wrapped in
//! [`ObjectError`], which snapshots the object's parameters, sources and
//! captured output so the report survives the run directory being moved.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use store::{Object, Parameters};

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] store::Error),

    #[error(transparent)]
    Transport(#[from] transport::Error),

    /// The emulator was started without part of its environment.
    #[error("missing required environment variable: {0}")]
    MissingEnvironment(String),

    /// The emulator arguments do not match the type's parameters.
    #[error("{0}")]
    Arguments(String),

    /// An object was declared twice with different parameters.
    #[error(
        "{object}: conflicting parameters\n\
         existing declaration from: {}\n  {existing}\n\
         new declaration from: {new_source}\n  {new}",
        .existing_sources.join(", ")
    )]
    ConflictingParameters {
        object: String,
        existing_sources: Vec<String>,
        existing: String,
        new_source: String,
        new: String,
    },

    /// A requirement pattern matched no object.
    #[error("requirement '{pattern}' of {object} does not match any object")]
    RequirementNotFound { object: String, pattern: String },

    /// Convergence stalled with objects left unfinished.
    #[error("The requirements of the following objects could not be resolved:\n{report}")]
    Unresolvable {
        /// Names of the unfinished objects.
        objects: Vec<String>,
        report: String,
    },

    /// Code was about to run for an object that is already done.
    #[error("attempting to run an already finished object: {0}")]
    AlreadyDone(String),

    #[error(transparent)]
    Object(Box<ObjectError>),

    #[error(transparent)]
    InitialManifest(Box<InitialManifestError>),

    /// Several workers failed in the same pass.
    #[error("{} objects failed:\n{}", .0.len(), render_all(.0))]
    Parallel(Vec<Error>),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap with the object's diagnostics unless already wrapped.
    pub fn for_object(self, object: &Object) -> Self {
        match self {
            Self::Object(_) | Self::Parallel(_) => self,
            other => Self::Object(Box::new(ObjectError::new(object, other))),
        }
    }

    /// Collapse a list of failures into one error.
    pub fn from_many(mut errors: Vec<Error>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Parallel(errors)),
        }
    }
}

fn render_all(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One captured output file.
#[derive(Debug, Clone)]
pub struct Stream {
    /// `stdout` or `stderr`.
    pub kind: &'static str,
    /// File name, e.g. `manifest` or `gencode-remote`.
    pub name: String,
    pub content: String,
}

/// Collect every non-empty file of the given stream directories.
fn read_streams(dirs: &[(&'static str, PathBuf)]) -> Vec<Stream> {
    let mut streams = Vec::new();
    for (kind, dir) in dirs {
        let Ok(names) = store::fsprop::list_dir(dir) else {
            continue;
        };
        for name in names {
            let content = fs::read_to_string(dir.join(&name)).unwrap_or_default();
            if !content.is_empty() {
                streams.push(Stream {
                    kind: *kind,
                    name,
                    content,
                });
            }
        }
    }
    streams
}

fn read_stream_file(kind: &'static str, path: &Path) -> Option<Stream> {
    let content = fs::read_to_string(path).ok()?;
    if content.is_empty() {
        return None;
    }
    let name = path.file_name()?.to_string_lossy().into_owned();
    Some(Stream {
        kind,
        name,
        content,
    })
}

fn write_streams(f: &mut fmt::Formatter<'_>, streams: &[Stream]) -> fmt::Result {
    for stream in streams {
        writeln!(f, "---- BEGIN {}:{} ----", stream.kind, stream.name)?;
        write!(f, "{}", stream.content)?;
        if !stream.content.ends_with('\n') {
            writeln!(f)?;
        }
        writeln!(f, "---- END {}:{} ----", stream.kind, stream.name)?;
    }
    Ok(())
}

fn write_header(f: &mut fmt::Formatter<'_>, header: &str) -> fmt::Result {
    writeln!(f, "{header}")?;
    writeln!(f, "{}", "=".repeat(header.len()))
}

/// Failure while preparing or running one object.
#[derive(Debug)]
pub struct ObjectError {
    pub name: String,
    pub parameters: Parameters,
    pub sources: Vec<String>,
    pub streams: Vec<Stream>,
    pub error: Error,
}

impl ObjectError {
    pub fn new(object: &Object, error: Error) -> Self {
        Self {
            name: object.name().to_string(),
            parameters: object.parameters().unwrap_or_default(),
            sources: object.source().unwrap_or_default(),
            streams: read_streams(&[
                ("stdout", object.stdout_path()),
                ("stderr", object.stderr_path()),
            ]),
            error,
        }
    }
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_header(f, &format!("Error processing object '{}'", self.name))?;
        writeln!(f, "{}", self.error)?;
        if !self.sources.is_empty() {
            writeln!(f, "Source: {}", self.sources.join(" "))?;
        }
        if !self.parameters.is_empty() {
            writeln!(f, "Parameters:")?;
            for (key, value) in &self.parameters {
                writeln!(f, "    {key}: {value}")?;
            }
        }
        write_streams(f, &self.streams)
    }
}

impl std::error::Error for ObjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Failure of the initial manifest.
#[derive(Debug)]
pub struct InitialManifestError {
    pub manifest: PathBuf,
    pub streams: Vec<Stream>,
    pub error: Error,
}

impl InitialManifestError {
    pub fn new(manifest: &Path, stdout: &Path, stderr: &Path, error: Error) -> Self {
        Self {
            manifest: manifest.to_path_buf(),
            streams: [
                read_stream_file("stdout", stdout),
                read_stream_file("stderr", stderr),
            ]
            .into_iter()
            .flatten()
            .collect(),
            error,
        }
    }
}

impl fmt::Display for InitialManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_header(
            f,
            &format!("Error processing initial manifest '{}'", self.manifest.display()),
        )?;
        writeln!(f, "{}", self.error)?;
        write_streams(f, &self.streams)
    }
}

impl std::error::Error for InitialManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
