//! Spawning one local process with captured output

use crate::error::{Error, Result};
use crate::exec::Invocation;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run `argv` to completion.
///
/// The process inherits the current environment plus `base_env` plus the
/// invocation's variables. Output is written to the invocation's log files
/// before the exit status is checked, so failed commands leave their output
/// behind for diagnostics.
pub(crate) fn execute(
    argv: &[String],
    base_env: &BTreeMap<String, String>,
    invocation: &Invocation,
) -> Result<String> {
    let command = argv.join(" ");
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::Spawn {
            command,
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        });
    };
    log::trace!("Executing: {command}");

    let output = Command::new(program)
        .args(args)
        .envs(base_env)
        .envs(&invocation.env)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| Error::Spawn {
            command: command.clone(),
            source,
        })?;

    if let Some(path) = &invocation.stdout {
        save(path, &output.stdout)?;
    }
    match &invocation.stderr {
        Some(path) => save(path, &output.stderr)?,
        None if output.status.success() && !output.stderr.is_empty() => {
            log::debug!(
                "{command}: {}",
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        None => {}
    }

    if !output.status.success() {
        return Err(Error::Exec {
            command,
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    if invocation.return_output {
        String::from_utf8(output.stdout).map_err(|_| Error::Decode { command })
    } else {
        Ok(String::new())
    }
}

fn save(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_capture_with_env() {
        let base = BTreeMap::from([("BASE".to_string(), "b".to_string())]);
        let invocation = Invocation::new().env("EXTRA", "e").capture();
        let out = execute(
            &argv(&["/bin/sh", "-c", "printf '%s-%s' \"$BASE\" \"$EXTRA\""]),
            &base,
            &invocation,
        )
        .unwrap();
        assert_eq!(out, "b-e");
    }

    #[test]
    fn test_output_not_returned_by_default() {
        let out = execute(&argv(&["echo", "hi"]), &BTreeMap::new(), &Invocation::new()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_failure_raises_and_keeps_logs() {
        let tmp = TempDir::new().unwrap();
        let invocation = Invocation::new()
            .log_to(Some(tmp.path().join("out")), Some(tmp.path().join("err")))
            .capture();
        let err = execute(
            &argv(&["/bin/sh", "-c", "echo partial; echo broken >&2; exit 3"]),
            &BTreeMap::new(),
            &invocation,
        )
        .unwrap_err();

        match err {
            Error::Exec { status, stderr, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "broken\n");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read_to_string(tmp.path().join("out")).unwrap(), "partial\n");
        assert_eq!(fs::read_to_string(tmp.path().join("err")).unwrap(), "broken\n");
    }

    #[test]
    fn test_spawn_failure() {
        let err = execute(
            &argv(&["/nonexistent/program"]),
            &BTreeMap::new(),
            &Invocation::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert!(matches!(
            execute(&[], &BTreeMap::new(), &Invocation::new()),
            Err(Error::Spawn { .. })
        ));
    }

    #[test]
    fn test_decode_error() {
        let err = execute(
            &argv(&["/bin/sh", "-c", "printf '\\377\\376'"]),
            &BTreeMap::new(),
            &Invocation::new().capture(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
