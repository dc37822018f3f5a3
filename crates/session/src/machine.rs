//! Session state machine.
//!
//! A [`Session`] holds the command under execution, the resolved ids and
//! the batch cursor. Every asynchronous completion (bucket list, file
//! listing, item transfer, deletion) is fed to [`Session::advance`], which
//! moves to the next state and returns the single next step to run.
//!
//! ```text
//! Idle -> ResolvingBucket -> [ListingFiles] -> Transferring(1) -> ... -> Done
//!                                  \-> RemovingFile -> Done
//! any non-terminal state --Interrupted--> Aborted
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use bridge_protocol::{BucketMeta, FileMeta, ServiceError};
use bridge_transfer::{Direction, WorkQueue};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::materializer::{download_queue, item_for_entry, upload_queue};
use crate::resolver::{find_file, match_bucket};
use crate::types::{Command, DownloadTarget, ItemOutcome, SessionReport, TransferItem};

/// File name that selects every file in a bucket.
pub const WILDCARD: &str = "*";

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ResolvingBucket,
    ListingFiles,
    /// `item` is the 1-based position of the transfer in flight.
    Transferring {
        item: usize,
    },
    RemovingFile,
    Done,
    /// Ended by a resolution, listing or setup error.
    Failed,
    /// Ended by an interrupt.
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Aborted)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ResolvingBucket => "resolving bucket",
            Self::ListingFiles => "listing files",
            Self::Transferring { .. } => "transferring",
            Self::RemovingFile => "removing file",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }
}

/// The result of whatever step ran last.
#[derive(Debug)]
pub enum Completion {
    Start,
    BucketsFetched(Result<Vec<BucketMeta>, ServiceError>),
    FilesListed(Result<Vec<FileMeta>, ServiceError>),
    ItemCompleted(ItemOutcome),
    FileDeleted(Result<(), ServiceError>),
    Interrupted,
}

/// What the driver must do next.
#[derive(Debug)]
pub enum NextStep {
    FetchBuckets,
    ListFiles {
        bucket_id: String,
    },
    /// Start one transfer. `index` is 1-based; `total` is 1 outside batches.
    Transfer {
        item: TransferItem,
        index: usize,
        total: usize,
    },
    DeleteFile {
        bucket_id: String,
        file_id: String,
    },
    Finish,
    Fail(SessionError),
    Abort,
}

#[derive(Debug, Clone)]
enum Request {
    ListFiles,
    GetBucketId,
    Download {
        file_name: String,
        target: DownloadTarget,
    },
    /// `source` is a regular file, or the scanned directory of a batch.
    Upload {
        source: PathBuf,
    },
    RemoveFile {
        file_name: String,
    },
}

/// One command invocation, from resolution to its last transfer.
#[derive(Debug)]
pub struct Session {
    request: Request,
    state: SessionState,
    bucket_name: String,
    bucket: Option<BucketMeta>,
    queue: Option<WorkQueue>,
    item_count: usize,
    item_cursor: usize,
    files: Vec<FileMeta>,
    removed: Option<FileMeta>,
    completed: usize,
    failed: usize,
    skipped: usize,
}

impl Session {
    fn new(bucket_name: String, request: Request) -> Result<Self, SessionError> {
        if bucket_name.is_empty() {
            return Err(SessionError::MissingArgument("bucket name"));
        }
        Ok(Self {
            request,
            state: SessionState::Idle,
            bucket_name,
            bucket: None,
            queue: None,
            item_count: 0,
            item_cursor: 0,
            files: Vec::new(),
            removed: None,
            completed: 0,
            failed: 0,
            skipped: 0,
        })
    }

    /// Lists the files of a bucket.
    pub fn list_files(bucket_name: impl Into<String>) -> Result<Self, SessionError> {
        Self::new(bucket_name.into(), Request::ListFiles)
    }

    /// Resolves a bucket name and stops.
    pub fn get_bucket_id(bucket_name: impl Into<String>) -> Result<Self, SessionError> {
        Self::new(bucket_name.into(), Request::GetBucketId)
    }

    /// Downloads one named file, or every file when `file_name` is `*`.
    ///
    /// Without a destination a single file goes to standard output. An
    /// existing directory receives the file under its remote name. The
    /// wildcard requires an existing directory.
    pub fn download(
        bucket_name: impl Into<String>,
        file_name: impl Into<String>,
        destination: Option<PathBuf>,
    ) -> Result<Self, SessionError> {
        let file_name = file_name.into();
        if file_name.is_empty() {
            return Err(SessionError::MissingArgument("file name"));
        }

        let target = match destination {
            Some(dir) if dir.is_dir() => DownloadTarget::IntoDir(dir),
            Some(path) if file_name == WILDCARD => {
                return Err(SessionError::NotADirectory(path.display().to_string()));
            }
            Some(path) => DownloadTarget::File(path),
            None if file_name == WILDCARD => {
                return Err(SessionError::MissingArgument("download directory"));
            }
            None => DownloadTarget::Stdout,
        };

        Self::new(bucket_name.into(), Request::Download { file_name, target })
    }

    /// Uploads one file, or every regular file under a directory.
    ///
    /// A directory is scanned here, before any service call, so a bad local
    /// path never costs a round trip.
    pub fn upload(bucket_name: impl Into<String>, local_path: &Path) -> Result<Self, SessionError> {
        let bucket_name = bucket_name.into();
        let metadata = fs::metadata(local_path)
            .map_err(|_| SessionError::InvalidPath(local_path.display().to_string()))?;

        if metadata.is_dir() {
            let queue = upload_queue(local_path)?;
            let mut session = Self::new(
                bucket_name,
                Request::Upload {
                    source: local_path.to_path_buf(),
                },
            )?;
            session.queue = Some(queue);
            return Ok(session);
        }

        let source = fs::canonicalize(local_path)
            .map_err(|_| SessionError::InvalidPath(local_path.display().to_string()))?;
        Self::new(bucket_name, Request::Upload { source })
    }

    /// Removes one named file from a bucket.
    pub fn remove_file(
        bucket_name: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let file_name = file_name.into();
        if file_name.is_empty() {
            return Err(SessionError::MissingArgument("file name"));
        }
        Self::new(bucket_name.into(), Request::RemoveFile { file_name })
    }

    pub fn command(&self) -> Command {
        match self.request {
            Request::ListFiles => Command::ListFiles,
            Request::GetBucketId => Command::GetBucketId,
            Request::Download { .. } => Command::DownloadFile,
            Request::Upload { .. } => Command::UploadFile,
            Request::RemoveFile { .. } => Command::RemoveFile,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// The resolved bucket, once resolution succeeded.
    pub fn bucket(&self) -> Option<&BucketMeta> {
        self.bucket.as_ref()
    }

    pub fn direction(&self) -> Option<Direction> {
        match self.request {
            Request::Download { .. } => Some(Direction::Download),
            Request::Upload { .. } => Some(Direction::Upload),
            _ => None,
        }
    }

    /// True once a work queue exists: a directory upload or a wildcard
    /// download whose listing has arrived.
    pub fn is_batch(&self) -> bool {
        self.queue.is_some()
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// 1-based index of the next item. Stays 0 outside batches.
    pub fn item_cursor(&self) -> usize {
        self.item_cursor
    }

    pub fn queue(&self) -> Option<&WorkQueue> {
        self.queue.as_ref()
    }

    pub fn queue_mut(&mut self) -> Option<&mut WorkQueue> {
        self.queue.as_mut()
    }

    /// Applies a completion and returns the next step.
    ///
    /// A completion that does not belong to the current state fails the
    /// session with [`SessionError::UnexpectedCompletion`].
    pub fn advance(&mut self, completion: Completion) -> NextStep {
        match (self.state, completion) {
            (state, Completion::Interrupted) if !state.is_terminal() => self.abort(),
            (SessionState::Idle, Completion::Start) => {
                debug!(command = %self.command(), bucket = %self.bucket_name, "session started");
                self.state = SessionState::ResolvingBucket;
                NextStep::FetchBuckets
            }
            (SessionState::ResolvingBucket, Completion::BucketsFetched(result)) => {
                self.on_buckets(result)
            }
            (SessionState::ListingFiles, Completion::FilesListed(result)) => self.on_files(result),
            (SessionState::Transferring { item }, Completion::ItemCompleted(outcome)) => {
                self.on_item(item, outcome)
            }
            (SessionState::RemovingFile, Completion::FileDeleted(result)) => match result {
                Ok(()) => self.finish(),
                Err(e) => self.fail(SessionError::Service(e)),
            },
            (state, _) => self.fail(SessionError::UnexpectedCompletion(state.label())),
        }
    }

    fn on_buckets(&mut self, result: Result<Vec<BucketMeta>, ServiceError>) -> NextStep {
        let buckets = match result {
            Ok(buckets) => buckets,
            Err(e) => {
                warn!(bucket = %self.bucket_name, error = %e, "bucket list request failed");
                return self.fail(SessionError::Resolution(e));
            }
        };

        let Some(bucket) = match_bucket(&buckets, &self.bucket_name).cloned() else {
            return self.fail(SessionError::InvalidBucketName(self.bucket_name.clone()));
        };
        info!(bucket = %bucket.name, id = %bucket.id, "bucket resolved");

        let bucket_id = bucket.id.clone();
        self.bucket = Some(bucket);

        match self.request {
            Request::ListFiles | Request::Download { .. } | Request::RemoveFile { .. } => {
                self.state = SessionState::ListingFiles;
                NextStep::ListFiles { bucket_id }
            }
            Request::Upload { .. } => self.begin_transfers(),
            Request::GetBucketId => self.finish(),
        }
    }

    fn on_files(&mut self, result: Result<Vec<FileMeta>, ServiceError>) -> NextStep {
        let files = match result {
            Ok(files) => files,
            Err(e) => return self.fail(SessionError::Listing(e)),
        };
        debug!(files = files.len(), "bucket listed");

        match self.request.clone() {
            Request::ListFiles => {
                self.files = files;
                self.finish()
            }
            Request::RemoveFile { file_name } => match find_file(&files, &file_name) {
                Some(file) => {
                    let bucket_id = self.bucket_id();
                    let file_id = file.id.clone();
                    self.removed = Some(file.clone());
                    self.state = SessionState::RemovingFile;
                    NextStep::DeleteFile { bucket_id, file_id }
                }
                None => self.fail(SessionError::FileNotFound(file_name)),
            },
            Request::Download { file_name, .. } if file_name == WILDCARD => {
                self.queue = Some(download_queue(&files));
                self.begin_transfers()
            }
            Request::Download { file_name, target } => match find_file(&files, &file_name) {
                Some(file) => {
                    let item = TransferItem::Download {
                        bucket_id: self.bucket_id(),
                        file_id: file.id.clone(),
                        file_name: file.file_name.clone(),
                        target,
                    };
                    self.start_single(item)
                }
                None => self.fail(SessionError::FileNotFound(file_name)),
            },
            Request::GetBucketId | Request::Upload { .. } => {
                self.fail(SessionError::UnexpectedCompletion(self.state.label()))
            }
        }
    }

    fn on_item(&mut self, item: usize, outcome: ItemOutcome) -> NextStep {
        match &outcome {
            ItemOutcome::Cancelled => return self.abort(),
            ItemOutcome::Uploaded { .. } | ItemOutcome::Downloaded { .. } => self.completed += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Failed(failure) => {
                warn!(item, error = %failure, "transfer failed");
                self.failed += 1;
            }
        }

        if !self.is_batch() {
            return self.finish();
        }

        self.item_cursor += 1;
        self.next_queued_item()
    }

    fn begin_transfers(&mut self) -> NextStep {
        let Some(queue) = &self.queue else {
            let Request::Upload { source } = self.request.clone() else {
                return self.fail(SessionError::UnexpectedCompletion(self.state.label()));
            };
            let item = TransferItem::Upload {
                bucket_id: self.bucket_id(),
                source,
            };
            return self.start_single(item);
        };

        self.item_count = queue.len();
        self.item_cursor = 1;
        info!(items = self.item_count, direction = %queue.direction(), "batch started");
        self.next_queued_item()
    }

    fn start_single(&mut self, item: TransferItem) -> NextStep {
        self.state = SessionState::Transferring { item: 1 };
        NextStep::Transfer {
            item,
            index: 1,
            total: 1,
        }
    }

    fn next_queued_item(&mut self) -> NextStep {
        if self.item_cursor > self.item_count {
            return self.finish();
        }

        let bucket_id = self.bucket_id();
        let download_dir = self.download_dir();
        let entry = self.queue.as_ref().and_then(|q| q.get(self.item_cursor));
        let Some(entry) = entry else {
            return self.fail(SessionError::UnexpectedCompletion(self.state.label()));
        };

        let item = item_for_entry(entry, &bucket_id, &download_dir);
        self.state = SessionState::Transferring {
            item: self.item_cursor,
        };
        NextStep::Transfer {
            item,
            index: self.item_cursor,
            total: self.item_count,
        }
    }

    fn bucket_id(&self) -> String {
        self.bucket
            .as_ref()
            .map(|b| b.id.clone())
            .unwrap_or_default()
    }

    fn download_dir(&self) -> PathBuf {
        match &self.request {
            Request::Download {
                target: DownloadTarget::IntoDir(dir),
                ..
            } => dir.clone(),
            _ => PathBuf::from("."),
        }
    }

    fn finish(&mut self) -> NextStep {
        self.state = SessionState::Done;
        NextStep::Finish
    }

    fn fail(&mut self, error: SessionError) -> NextStep {
        self.state = SessionState::Failed;
        NextStep::Fail(error)
    }

    fn abort(&mut self) -> NextStep {
        info!(state = self.state.label(), "session interrupted");
        self.state = SessionState::Aborted;
        NextStep::Abort
    }

    /// Summarizes the session. Meaningful once it reached `Done`.
    pub fn into_report(self) -> SessionReport {
        let command = self.command();
        SessionReport {
            command: Some(command),
            bucket: self.bucket,
            files: self.files,
            removed: self.removed,
            batch: self.queue.is_some(),
            item_count: self.item_count,
            completed: self.completed,
            failed: self.failed,
            skipped: self.skipped,
        }
    }
}
