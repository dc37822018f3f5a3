//! Data types for the session flow.

use std::env;
use std::fmt;
use std::path::PathBuf;

use bridge_protocol::{BucketMeta, FileMeta, ServiceError};
use bridge_transfer::{Direction, TransferProgress};
use tokio::sync::oneshot;

/// The command a session executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ListFiles,
    DownloadFile,
    UploadFile,
    GetBucketId,
    RemoveFile,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ListFiles => "list-files",
            Self::DownloadFile => "download-file",
            Self::UploadFile => "upload-file",
            Self::GetBucketId => "get-bucket-id",
            Self::RemoveFile => "remove-file",
        };
        f.write_str(name)
    }
}

/// Where the durable work lists are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub download_queue_path: PathBuf,
    pub upload_queue_path: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            download_queue_path: PathBuf::from("bridge_download_queue.txt"),
            upload_queue_path: env::temp_dir().join("bridge_upload_queue.txt"),
        }
    }
}

/// Destination of one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    /// Write the content to standard output.
    Stdout,
    /// Write to exactly this path.
    File(PathBuf),
    /// Write to `<dir>/<remote file name>`.
    IntoDir(PathBuf),
}

/// One unit of work for the transfer executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferItem {
    Upload {
        bucket_id: String,
        source: PathBuf,
    },
    Download {
        bucket_id: String,
        file_id: String,
        file_name: String,
        target: DownloadTarget,
    },
}

impl TransferItem {
    pub fn direction(&self) -> Direction {
        match self {
            Self::Upload { .. } => Direction::Upload,
            Self::Download { .. } => Direction::Download,
        }
    }

    /// True for a download whose content goes to standard output.
    pub fn writes_to_stdout(&self) -> bool {
        matches!(
            self,
            Self::Download {
                target: DownloadTarget::Stdout,
                ..
            }
        )
    }

    /// Human-readable name of the item, for status lines.
    pub fn display_name(&self) -> String {
        match self {
            Self::Upload { source, .. } => source.display().to_string(),
            Self::Download { file_name, .. } => file_name.clone(),
        }
    }
}

/// Why a single item failed. Never fatal to a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemFailure {
    #[error("Invalid file path: {0}")]
    InvalidFilePath(String),

    #[error("Unable to open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("{0}")]
    Service(ServiceError),
}

/// Terminal result of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Uploaded { file_id: String },
    /// `path` is `None` when the content went to standard output.
    Downloaded { path: Option<PathBuf> },
    /// The operator declined to overwrite an existing file.
    Skipped { path: PathBuf },
    Failed(ItemFailure),
    Cancelled,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Uploaded { .. } | Self::Downloaded { .. })
    }
}

/// Event emitted while a session runs.
#[derive(Debug)]
pub enum SessionEvent {
    /// An item is about to start. `index` is 1-based; `total` is 1 for
    /// single-item sessions.
    ItemStarted {
        index: usize,
        total: usize,
        direction: Direction,
        name: String,
        /// The content is written to standard output.
        to_stdout: bool,
    },
    /// Progress of the item in flight.
    Progress(TransferProgress),
    /// An item reached its terminal outcome.
    ItemFinished {
        index: usize,
        total: usize,
        direction: Direction,
        name: String,
        outcome: ItemOutcome,
    },
    /// A download target already exists. Reply `true` to overwrite; a
    /// dropped sender counts as `false`.
    ConfirmOverwrite {
        path: PathBuf,
        reply: oneshot::Sender<bool>,
    },
}

/// Summary of a session that finished normally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub command: Option<Command>,
    pub bucket: Option<BucketMeta>,
    /// The bucket listing, for `ListFiles`.
    pub files: Vec<FileMeta>,
    /// The removed file, for `RemoveFile`.
    pub removed: Option<FileMeta>,
    pub batch: bool,
    pub item_count: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SessionReport {
    /// True when a batch finished with at least one failed item.
    pub fn is_degraded(&self) -> bool {
        self.batch && self.failed > 0
    }
}
