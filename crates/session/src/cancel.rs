//! Interrupt handling.
//!
//! The monitor owns the session's parent token. Each transfer gets a child
//! token through a [`TransferHandle`], so an interrupt reaches whichever
//! transfer is in flight without the monitor tracking it.

use std::future::Future;

use bridge_transfer::ProgressCallback;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Forwards an interrupt signal to the session's cancellation token.
pub struct CancellationMonitor {
    token: CancellationToken,
}

impl CancellationMonitor {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Spawns a task that cancels the token when `signal` resolves.
    ///
    /// The task exits quietly if the token is cancelled some other way
    /// first. Abort the returned handle once the session is over.
    pub fn watch<F>(&self, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = std::io::Result<()>> + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = signal => match result {
                    Ok(()) => {
                        info!("interrupt received, cancelling transfer");
                        token.cancel();
                    }
                    Err(e) => warn!(error = %e, "unable to listen for interrupt"),
                },
                _ = token.cancelled() => {}
            }
        })
    }
}

/// One in-flight upload or download.
///
/// Lives from the start of an item until its outcome is known. Dropping it
/// detaches the child token from the parent.
pub struct TransferHandle {
    cancel: CancellationToken,
    progress: ProgressCallback,
}

impl TransferHandle {
    pub fn new(parent: &CancellationToken, progress: ProgressCallback) -> Self {
        Self {
            cancel: parent.child_token(),
            progress,
        }
    }

    /// Token handed to the service for this transfer only.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> ProgressCallback {
        self.progress.clone()
    }

    /// Resolves once this transfer is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
