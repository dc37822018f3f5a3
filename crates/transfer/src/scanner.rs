//! Local source enumeration for batch uploads.
//!
//! Walks a directory depth-first, pre-order, and yields the absolute,
//! symlink-resolved path of every regular file. Entries within a directory
//! are visited in name order so the traversal is reproducible.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::TransferError;

/// Scans `root` recursively and returns absolute paths of regular files.
pub fn scan_upload_sources(root: &Path) -> Result<Vec<PathBuf>, TransferError> {
    let root = fs::canonicalize(root)?;
    if !root.is_dir() {
        return Err(TransferError::InvalidPath(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    walk_dir(&root, &mut files)?;
    Ok(files)
}

fn walk_dir(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), TransferError> {
    let mut entries = fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(&path, files)?;
        } else if file_type.is_file() {
            files.push(path);
        } else if file_type.is_symlink() {
            // Links are resolved but never descended into, so cycles can't form.
            match fs::canonicalize(&path) {
                Ok(target) if target.is_file() => files.push(target),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping dangling link"),
            }
        }
    }

    Ok(())
}
