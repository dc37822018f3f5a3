//! Session orchestration for the bridge client.
//!
//! This crate turns the service's one-shot, single-item calls into a
//! session that can sequence any number of items. It has no transport
//! dependencies: the app provides a `BridgeService` implementation.
//!
//! # Flow
//!
//! 1. **Resolve** the bucket name to a service id
//! 2. **List** the bucket's files (downloads, removals, listings)
//! 3. **Materialize** a work queue for batches
//! 4. **Transfer** items one at a time until the queue is drained
//!
//! Each step's completion is fed into [`Session::advance`], which decides
//! the next step. [`SessionRunner`] drives that loop against a service.

pub mod cancel;
pub mod error;
pub mod executor;
pub mod machine;
pub mod materializer;
pub mod resolver;
pub mod runner;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export primary types for convenience.
pub use cancel::{CancellationMonitor, TransferHandle};
pub use error::SessionError;
pub use executor::TransferExecutor;
pub use machine::{Completion, NextStep, Session, SessionState};
pub use resolver::{find_file, match_bucket, resolve_bucket};
pub use runner::SessionRunner;
pub use service::{BridgeService, DownloadRequest, ServiceFuture, UploadRequest};
pub use types::{
    Command, DownloadTarget, ItemFailure, ItemOutcome, SessionEvent, SessionOptions,
    SessionReport, TransferItem,
};
