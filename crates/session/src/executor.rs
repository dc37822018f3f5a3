//! Transfer executor: runs exactly one upload or download.
//!
//! The executor opens the local side, asks before clobbering an existing
//! download target, submits the call to the service and races it against
//! the transfer's cancel token. Every item ends in exactly one
//! [`ItemOutcome`], which is also announced as an `ItemFinished` event.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_protocol::ServiceError;
use bridge_transfer::{ProgressCallback, TransferProgress, validate_remote_name};
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel::TransferHandle;
use crate::service::{BridgeService, DownloadRequest, UploadRequest};
use crate::types::{DownloadTarget, ItemFailure, ItemOutcome, SessionEvent, TransferItem};

/// Runs single transfers against a service.
pub struct TransferExecutor<'a> {
    service: &'a dyn BridgeService,
    events_tx: &'a mpsc::Sender<SessionEvent>,
    cancel: &'a CancellationToken,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(
        service: &'a dyn BridgeService,
        events_tx: &'a mpsc::Sender<SessionEvent>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            service,
            events_tx,
            cancel,
        }
    }

    /// Runs one item to its terminal outcome.
    ///
    /// `index` is the 1-based position of the item and `total` the batch
    /// size (1 outside batches); both are only used for reporting.
    pub async fn execute(&self, item: TransferItem, index: usize, total: usize) -> ItemOutcome {
        let direction = item.direction();
        let name = item.display_name();
        let to_stdout = item.writes_to_stdout();

        let _ = self
            .events_tx
            .send(SessionEvent::ItemStarted {
                index,
                total,
                direction,
                name: name.clone(),
                to_stdout,
            })
            .await;

        let handle = TransferHandle::new(self.cancel, self.progress_forwarder());
        let outcome = if handle.is_cancelled() {
            ItemOutcome::Cancelled
        } else {
            match item {
                TransferItem::Upload { bucket_id, source } => {
                    self.upload(&handle, bucket_id, source).await
                }
                TransferItem::Download {
                    bucket_id,
                    file_id,
                    file_name,
                    target,
                } => {
                    self.download(&handle, bucket_id, file_id, file_name, target)
                        .await
                }
            }
        };
        drop(handle);

        match &outcome {
            ItemOutcome::Failed(failure) => {
                warn!(item = index, total, %direction, name = %name, error = %failure, "transfer failed")
            }
            other => info!(item = index, total, %direction, name = %name, outcome = ?other, "transfer finished"),
        }

        let _ = self
            .events_tx
            .send(SessionEvent::ItemFinished {
                index,
                total,
                direction,
                name,
                outcome: outcome.clone(),
            })
            .await;

        outcome
    }

    async fn upload(&self, handle: &TransferHandle, bucket_id: String, source: PathBuf) -> ItemOutcome {
        let invalid = || ItemOutcome::Failed(ItemFailure::InvalidFilePath(source.display().to_string()));

        let Some(file_name) = source.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return invalid();
        };
        let file = match tokio::fs::File::open(&source).await {
            Ok(file) => file,
            Err(e) => {
                debug!(path = %source.display(), error = %e, "unable to open upload source");
                return invalid();
            }
        };
        let size = match file.metadata().await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return invalid(),
        };

        (handle.progress())(TransferProgress::preparing());
        let request = UploadRequest {
            bucket_id,
            file_name,
            size,
            source: Box::new(file),
            progress: handle.progress(),
            cancel: handle.token(),
        };

        tokio::select! {
            biased;
            _ = handle.cancelled() => ItemOutcome::Cancelled,
            result = self.service.store_file(request) => match result {
                Ok(file_id) => ItemOutcome::Uploaded { file_id },
                Err(e) => service_failure(e),
            },
        }
    }

    async fn download(
        &self,
        handle: &TransferHandle,
        bucket_id: String,
        file_id: String,
        file_name: String,
        target: DownloadTarget,
    ) -> ItemOutcome {
        let path = match target {
            DownloadTarget::Stdout => None,
            DownloadTarget::File(path) => Some(path),
            DownloadTarget::IntoDir(dir) => {
                if let Err(e) = validate_remote_name(&file_name) {
                    warn!(name = %file_name, error = %e, "refusing remote file name");
                    return ItemOutcome::Failed(ItemFailure::InvalidFilePath(file_name));
                }
                Some(dir.join(&file_name))
            }
        };

        let sink: Box<dyn AsyncWrite + Send + Unpin> = match &path {
            None => Box::new(tokio::io::stdout()),
            Some(path) => {
                if tokio::fs::try_exists(path).await.unwrap_or(false)
                    && !self.confirm_overwrite(handle, path).await
                {
                    if handle.is_cancelled() {
                        return ItemOutcome::Cancelled;
                    }
                    info!(path = %path.display(), "overwrite declined");
                    return ItemOutcome::Skipped { path: path.clone() };
                }
                match tokio::fs::File::create(path).await {
                    Ok(file) => Box::new(file),
                    Err(e) => {
                        return ItemOutcome::Failed(ItemFailure::Open {
                            path: path.display().to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        };

        (handle.progress())(TransferProgress::preparing());
        let request = DownloadRequest {
            bucket_id,
            file_id,
            sink,
            progress: handle.progress(),
            cancel: handle.token(),
        };

        tokio::select! {
            biased;
            _ = handle.cancelled() => ItemOutcome::Cancelled,
            result = self.service.resolve_file(request) => match result {
                Ok(()) => ItemOutcome::Downloaded { path },
                Err(e) => service_failure(e),
            },
        }
    }

    /// Asks the event consumer whether to overwrite `path`. No answer is "no".
    async fn confirm_overwrite(&self, handle: &TransferHandle, path: &Path) -> bool {
        let (reply, answer) = oneshot::channel();
        let event = SessionEvent::ConfirmOverwrite {
            path: path.to_path_buf(),
            reply,
        };
        if self.events_tx.send(event).await.is_err() {
            return false;
        }

        tokio::select! {
            biased;
            _ = handle.cancelled() => false,
            answer = answer => answer.unwrap_or(false),
        }
    }

    /// Progress goes out with `try_send`: a full channel drops the frame
    /// instead of stalling the transfer.
    fn progress_forwarder(&self) -> ProgressCallback {
        let events_tx = self.events_tx.clone();
        Arc::new(move |progress| {
            let _ = events_tx.try_send(SessionEvent::Progress(progress));
        })
    }
}

fn service_failure(error: ServiceError) -> ItemOutcome {
    if error.is_cancelled() {
        ItemOutcome::Cancelled
    } else {
        ItemOutcome::Failed(ItemFailure::Service(error))
    }
}
