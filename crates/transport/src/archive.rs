//! Archives for bulk directory transfer

use crate::error::{Error, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Directories with more files than this are archived when archiving is on.
pub const ARCHIVE_FILES_LIMIT: usize = 1;

/// Archive format used for bulk transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveMode {
    Tar,
    Tgz,
}

impl ArchiveMode {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Tar => ".tar",
            Self::Tgz => ".tar.gz",
        }
    }

    /// `tar` flags extracting this format from a file.
    pub fn extract_flags(self) -> &'static str {
        match self {
            Self::Tar => "-xf",
            Self::Tgz => "-xzf",
        }
    }
}

impl fmt::Display for ArchiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tar => "tar",
            Self::Tgz => "tgz",
        })
    }
}

impl FromStr for ArchiveMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "tar" => Ok(Self::Tar),
            "tgz" => Ok(Self::Tgz),
            other => Err(format!("unknown archiving mode '{other}' (expected tar or tgz)")),
        }
    }
}

/// Number of files below `dir`, following symlinks.
pub fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| !e.file_type().is_dir())
        .count()
}

/// Archive the contents of `dir` into a temporary file.
///
/// Entries are stored relative to `dir`, so extracting with `-C dest`
/// recreates the contents directly inside `dest`.
pub fn create(dir: &Path, mode: ArchiveMode) -> Result<NamedTempFile> {
    let archive_error = |source| Error::Archive {
        path: dir.to_path_buf(),
        source,
    };

    let file = tempfile::Builder::new()
        .prefix(".cdist-transfer")
        .suffix(mode.extension())
        .tempfile()
        .map_err(archive_error)?;
    let writer = file.reopen().map_err(archive_error)?;

    match mode {
        ArchiveMode::Tar => {
            let mut builder = tar::Builder::new(writer);
            builder.append_dir_all(".", dir).map_err(archive_error)?;
            builder.into_inner().map_err(archive_error)?.flush().map_err(archive_error)?;
        }
        ArchiveMode::Tgz => {
            let encoder = GzEncoder::new(writer, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            builder.append_dir_all(".", dir).map_err(archive_error)?;
            let encoder = builder.into_inner().map_err(archive_error)?;
            encoder.finish().map_err(archive_error)?.flush().map_err(archive_error)?;
        }
    }

    log::trace!("Archived {} as {}", dir.display(), mode);
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("one"), "1").unwrap();
        fs::write(tmp.path().join("sub/two"), "2").unwrap();
        tmp
    }

    fn entry_names<R: std::io::Read>(archive: &mut tar::Archive<R>) -> Vec<String> {
        let mut names: Vec<_> = archive
            .entries()
            .unwrap()
            .map(|e| {
                let path = e.unwrap().path().unwrap().to_string_lossy().into_owned();
                path.trim_start_matches("./").to_string()
            })
            .filter(|name| name.contains("one") || name.contains("two"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("tar".parse::<ArchiveMode>().unwrap(), ArchiveMode::Tar);
        assert_eq!("tgz".parse::<ArchiveMode>().unwrap(), ArchiveMode::Tgz);
        assert!("zip".parse::<ArchiveMode>().is_err());
        assert_eq!(ArchiveMode::Tgz.to_string(), "tgz");
    }

    #[test]
    fn test_count_files() {
        let tmp = tree();
        assert_eq!(count_files(tmp.path()), 2);
    }

    #[test]
    fn test_tar_contents() {
        let tmp = tree();
        let file = create(tmp.path(), ArchiveMode::Tar).unwrap();
        let mut archive = tar::Archive::new(File::open(file.path()).unwrap());
        assert_eq!(entry_names(&mut archive), vec!["one", "sub/two"]);
    }

    #[test]
    fn test_tgz_contents() {
        let tmp = tree();
        let file = create(tmp.path(), ArchiveMode::Tgz).unwrap();
        assert!(file.path().to_string_lossy().ends_with(".tar.gz"));
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(file.path()).unwrap()));
        assert_eq!(entry_names(&mut archive), vec!["one", "sub/two"]);
    }
}
