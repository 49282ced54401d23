//! File boundary: which inputs are accepted, where rewritten text goes, and
//! how it is written.

use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The only source extension accepted.
pub const SUPPORTED_EXTENSION: &str = "py";
/// Suffix appended to the file stem in review mode.
pub const REVIEW_SUFFIX: &str = "_review";

/// Where rewritten text is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Write `<stem>_review.py` next to the input.
    #[default]
    Review,
    /// Overwrite the input.
    InPlace,
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("path has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whether `path` carries the Python source extension.
pub fn is_supported(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(SUPPORTED_EXTENSION)
}

/// Whether `path` looks like a file this tool produced in review mode.
pub fn is_review_output(path: &Path) -> bool {
    is_supported(path)
        && path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.ends_with(REVIEW_SUFFIX))
}

/// Destination of the rewritten text for `input`.
pub fn output_path(input: &Path, mode: OutputMode) -> Result<PathBuf, OutputError> {
    match mode {
        OutputMode::InPlace => Ok(input.to_path_buf()),
        OutputMode::Review => {
            let stem = input
                .file_stem()
                .ok_or_else(|| OutputError::NoFileName(input.to_path_buf()))?;
            let mut name = stem.to_os_string();
            name.push(REVIEW_SUFFIX);
            if let Some(ext) = input.extension() {
                name.push(".");
                name.push(ext);
            }
            Ok(input.with_file_name(name))
        }
    }
}

/// Write `content` to `path` atomically and bump its mtime.
pub fn persist(path: &Path, content: &str) -> Result<(), OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    atomic_write(path, content.as_bytes()).map_err(io_err)?;
    filetime::set_file_mtime(path, filetime::FileTime::now()).map_err(io_err)?;
    Ok(())
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or nothing changes. An existing target
/// keeps its permissions.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    if let Ok(existing) = std::fs::metadata(path) {
        temp.as_file().set_permissions(existing.permissions())?;
    }
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
