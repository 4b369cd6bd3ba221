//! Inter-object messages
//!
//! Every manifest and gencode script reads the run's messages from a private
//! copy (`__messages_in`) and writes new ones to `__messages_out`. After the
//! script ran, its output is appended to the run's message file with the
//! writer's prefix, one `prefix:message` line per message.

use crate::env;
use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct Messages {
    global: PathBuf,
    prefix: String,
    messages_in: NamedTempFile,
    messages_out: NamedTempFile,
}

impl Messages {
    /// Snapshot the run's messages for one script invocation.
    pub fn new(global: &Path, prefix: impl Into<String>) -> Result<Self> {
        let messages_in = NamedTempFile::new().map_err(|e| Error::io(global, e))?;
        let messages_out = NamedTempFile::new().map_err(|e| Error::io(global, e))?;
        if global.is_file() {
            fs::copy(global, messages_in.path()).map_err(|e| Error::io(global, e))?;
        }
        Ok(Self {
            global: global.to_path_buf(),
            prefix: prefix.into(),
            messages_in,
            messages_out,
        })
    }

    pub fn env(&self) -> [(&'static str, String); 2] {
        [
            (
                env::MESSAGES_IN,
                self.messages_in.path().to_string_lossy().into_owned(),
            ),
            (
                env::MESSAGES_OUT,
                self.messages_out.path().to_string_lossy().into_owned(),
            ),
        ]
    }

    /// Append the script's messages to the run's message file.
    pub fn merge(self) -> Result<()> {
        let out = self.messages_out.path();
        let content = fs::read_to_string(out).map_err(|e| Error::io(out, e))?;

        let mut merged = String::new();
        for line in content.lines().filter(|line| !line.is_empty()) {
            merged.push_str(&format!("{}:{line}\n", self.prefix));
        }
        if merged.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.global)
            .map_err(|e| Error::io(&self.global, e))?;
        file.write_all(merged.as_bytes())
            .map_err(|e| Error::io(&self.global, e))
    }
}
