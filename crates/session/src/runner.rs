//! Session driver.
//!
//! Runs the step returned by [`Session::advance`], feeds the completion
//! back in, and repeats until the session finishes, fails or is aborted.
//! Exactly one service call is outstanding at any time.

use std::future::Future;

use bridge_protocol::ServiceError;
use bridge_transfer::Direction;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::SessionError;
use crate::executor::TransferExecutor;
use crate::machine::{Completion, NextStep, Session};
use crate::service::BridgeService;
use crate::types::{SessionEvent, SessionOptions, SessionReport};

/// Drives sessions against a service and publishes their events.
pub struct SessionRunner {
    options: SessionOptions,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: Option<mpsc::Receiver<SessionEvent>>,
    cancel: CancellationToken,
}

impl Default for SessionRunner {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl SessionRunner {
    pub fn new(options: SessionOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            options,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events_rx.take()
    }

    /// Returns the parent cancellation token for every transfer this
    /// runner starts.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs `session` to completion.
    ///
    /// A batch's work queue is written to disk before its first item and
    /// removed once the batch is done. An aborted or failed batch leaves
    /// the file in place.
    pub async fn run(
        &self,
        service: &dyn BridgeService,
        mut session: Session,
    ) -> Result<SessionReport, SessionError> {
        let executor = TransferExecutor::new(service, &self.events_tx, &self.cancel);
        let mut completion = Completion::Start;

        loop {
            if self.cancel.is_cancelled() {
                completion = Completion::Interrupted;
            }

            completion = match session.advance(completion) {
                NextStep::FetchBuckets => match self.guard(service.get_buckets()).await {
                    Some(result) => Completion::BucketsFetched(result),
                    None => Completion::Interrupted,
                },
                NextStep::ListFiles { bucket_id } => {
                    match self.guard(service.list_files(&bucket_id)).await {
                        Some(result) => Completion::FilesListed(result),
                        None => Completion::Interrupted,
                    }
                }
                NextStep::Transfer { item, index, total } => {
                    self.persist_queue(&mut session)?;
                    Completion::ItemCompleted(executor.execute(item, index, total).await)
                }
                NextStep::DeleteFile { bucket_id, file_id } => {
                    match self.guard(service.delete_file(&bucket_id, &file_id)).await {
                        Some(result) => Completion::FileDeleted(result),
                        None => Completion::Interrupted,
                    }
                }
                NextStep::Finish => {
                    if let Some(queue) = session.queue_mut() {
                        if let Err(e) = queue.discard_file() {
                            warn!(error = %e, "unable to remove work queue file");
                        }
                    }
                    info!(command = %session.command(), "session complete");
                    return Ok(session.into_report());
                }
                NextStep::Fail(e) => return Err(e),
                NextStep::Abort => {
                    if let Some(path) = session.queue().and_then(|q| q.persisted_path()) {
                        info!(path = %path.display(), "work queue left in place");
                    }
                    return Err(SessionError::Cancelled);
                }
            };
        }
    }

    /// Awaits a service call unless the session is interrupted first.
    async fn guard<T>(
        &self,
        call: impl Future<Output = Result<T, ServiceError>>,
    ) -> Option<Result<T, ServiceError>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = call => Some(result),
        }
    }

    fn persist_queue(&self, session: &mut Session) -> Result<(), SessionError> {
        let path = match session.direction() {
            Some(Direction::Upload) => self.options.upload_queue_path.clone(),
            _ => self.options.download_queue_path.clone(),
        };
        if let Some(queue) = session.queue_mut() {
            if queue.persisted_path().is_none() {
                queue.persist(&path)?;
            }
        }
        Ok(())
    }
}
