//! Ordered work list for batch transfers.
//!
//! The in-memory entries are the source of truth. The list can be written
//! through once to a plain-text artifact (one entry per line) and removed when
//! the batch completes normally.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::TransferError;

/// Which way bytes move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => f.write_str("upload"),
            Self::Download => f.write_str("download"),
        }
    }
}

/// One item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkQueueEntry {
    /// A remote file to fetch, written as `<file-id>:<file-name>`.
    Download { file_id: String, file_name: String },
    /// A local file to send, written as its absolute path.
    Upload { path: PathBuf },
}

impl WorkQueueEntry {
    pub fn direction(&self) -> Direction {
        match self {
            Self::Download { .. } => Direction::Download,
            Self::Upload { .. } => Direction::Upload,
        }
    }

    /// Renders the entry as one line of the durable list (no newline).
    pub fn to_line(&self) -> String {
        match self {
            Self::Download { file_id, file_name } => format!("{file_id}:{file_name}"),
            Self::Upload { path } => path.to_string_lossy().into_owned(),
        }
    }
}

/// An ordered batch of entries, all in one direction.
#[derive(Debug)]
pub struct WorkQueue {
    direction: Direction,
    entries: Vec<WorkQueueEntry>,
    persisted: Option<PathBuf>,
}

impl WorkQueue {
    /// Creates a queue of download entries from `(file_id, file_name)` pairs.
    pub fn downloads<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            direction: Direction::Download,
            entries: pairs
                .into_iter()
                .map(|(file_id, file_name)| WorkQueueEntry::Download { file_id, file_name })
                .collect(),
            persisted: None,
        }
    }

    /// Creates a queue of upload entries from local paths.
    pub fn uploads<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self {
            direction: Direction::Upload,
            entries: paths
                .into_iter()
                .map(|path| WorkQueueEntry::Upload { path })
                .collect(),
            persisted: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry at a 1-based cursor position.
    pub fn get(&self, cursor: usize) -> Option<&WorkQueueEntry> {
        cursor.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn entries(&self) -> &[WorkQueueEntry] {
        &self.entries
    }

    /// Path of the durable artifact, if it has been written.
    pub fn persisted_path(&self) -> Option<&Path> {
        self.persisted.as_deref()
    }

    /// Writes every entry, in order, to `path`. The list is write-once.
    pub fn persist(&mut self, path: &Path) -> Result<(), TransferError> {
        if let Some(existing) = &self.persisted {
            return Err(TransferError::QueueAlreadyPersisted(
                existing.display().to_string(),
            ));
        }

        let mut file = fs::File::create(path)?;
        for entry in &self.entries {
            writeln!(file, "{}", entry.to_line())?;
        }
        file.sync_all()?;

        debug!(path = %path.display(), entries = self.entries.len(), "work queue written");
        self.persisted = Some(path.to_path_buf());
        Ok(())
    }

    /// Deletes the durable artifact, if any. Safe to call more than once.
    pub fn discard_file(&mut self) -> Result<(), TransferError> {
        let Some(path) = self.persisted.take() else {
            return Ok(());
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "work queue removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
