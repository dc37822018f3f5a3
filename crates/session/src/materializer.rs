//! Work queue materialization for batch transfers.
//!
//! A batch download takes every file of a bucket listing, in listing
//! order. A batch upload takes every regular file under a local directory,
//! depth-first pre-order. Zero items is a valid batch.

use std::path::Path;

use bridge_protocol::FileMeta;
use bridge_transfer::{WorkQueue, WorkQueueEntry, scan_upload_sources};
use tracing::debug;

use crate::error::SessionError;
use crate::types::{DownloadTarget, TransferItem};

/// Builds a download queue from a bucket listing.
pub fn download_queue(files: &[FileMeta]) -> WorkQueue {
    let queue = WorkQueue::downloads(
        files
            .iter()
            .map(|f| (f.id.clone(), f.file_name.clone())),
    );
    debug!(items = queue.len(), "download queue materialized");
    queue
}

/// Builds an upload queue from the regular files under `root`.
pub fn upload_queue(root: &Path) -> Result<WorkQueue, SessionError> {
    let sources = scan_upload_sources(root)
        .map_err(|e| SessionError::InvalidPath(format!("{}: {e}", root.display())))?;
    let queue = WorkQueue::uploads(sources);
    debug!(root = %root.display(), items = queue.len(), "upload queue materialized");
    Ok(queue)
}

/// Turns a queue entry into a transfer item for the resolved bucket.
///
/// Download entries land in `download_dir` under their remote name.
pub fn item_for_entry(
    entry: &WorkQueueEntry,
    bucket_id: &str,
    download_dir: &Path,
) -> TransferItem {
    match entry {
        WorkQueueEntry::Download { file_id, file_name } => TransferItem::Download {
            bucket_id: bucket_id.to_string(),
            file_id: file_id.clone(),
            file_name: file_name.clone(),
            target: DownloadTarget::IntoDir(download_dir.to_path_buf()),
        },
        WorkQueueEntry::Upload { path } => TransferItem::Upload {
            bucket_id: bucket_id.to_string(),
            source: path.clone(),
        },
    }
}
