//! Transfer plumbing shared by the session core and service adapters:
//! progress reporting, the batch work queue, upload source scanning and
//! remote file name checks.

mod progress;
mod queue;
mod scanner;
mod validation;

pub use progress::{ProgressCallback, ProgressCounter, TransferProgress, silent_progress};
pub use queue::{Direction, WorkQueue, WorkQueueEntry};
pub use scanner::scan_upload_sources;
pub use validation::validate_remote_name;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("work queue already written to {0}")]
    QueueAlreadyPersisted(String),
}
