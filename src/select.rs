//! Selection of the files a run processes: explicit paths, directory walks,
//! and files changed in a git working tree.

use crate::output::{is_review_output, is_supported};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SelectError {
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to run git: {0}")]
    GitSpawn(#[source] std::io::Error),

    #[error("git {args} failed: {stderr}")]
    Git { args: String, stderr: String },
}

/// Expand `paths` into the list of files to process.
///
/// Files are taken as given, whatever their extension, so that an
/// unsupported file produces a diagnostic later instead of vanishing.
/// Directories contribute every `.py` file below them except review outputs.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, SelectError> {
    let mut files = BTreeSet::new();
    for path in paths {
        if path.is_file() {
            files.insert(path.clone());
        } else if path.is_dir() {
            files.extend(python_files_in(path)?);
        } else {
            return Err(SelectError::NotFound(path.clone()));
        }
    }
    Ok(files.into_iter().collect())
}

/// Every `.py` file below `dir`, sorted, skipping hidden directories and
/// review outputs.
pub fn python_files_in(dir: &Path) -> Result<Vec<PathBuf>, SelectError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with('.') || name == "__pycache__")
    });

    for entry in walker {
        let entry = entry.map_err(|source| SelectError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && is_supported(path) && !is_review_output(path) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Python files that are untracked, modified, or staged in the git working
/// tree containing `repo`.
pub fn changed_files(repo: &Path) -> Result<Vec<PathBuf>, SelectError> {
    let root = PathBuf::from(git(repo, &["rev-parse", "--show-toplevel"])?.trim());

    let mut changed = BTreeSet::new();
    for args in [
        &["ls-files", "--others", "--exclude-standard"][..],
        &["diff", "--name-only"][..],
        &["diff", "--name-only", "--cached"][..],
    ] {
        for line in git(&root, args)?.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let path = root.join(line);
            if is_supported(&path) && !is_review_output(&path) && path.is_file() {
                changed.insert(path);
            }
        }
    }

    Ok(changed.into_iter().collect())
}

fn git(dir: &Path, args: &[&str]) -> Result<String, SelectError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(SelectError::GitSpawn)?;

    if !output.status.success() {
        return Err(SelectError::Git {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
