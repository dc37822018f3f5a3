//! The narrow async call interface to the remote storage service.
//!
//! The app implements `BridgeService` on top of its transport. Using a
//! trait keeps the session logic decoupled from the wire and testable
//! with mocks. Every call resolves exactly once, with a value or a
//! [`ServiceError`] category.

use std::future::Future;
use std::pin::Pin;

use bridge_protocol::{BridgeInfo, BucketMeta, FileMeta, ServiceError};
use bridge_transfer::ProgressCallback;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// Boxed future returned by every service call.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// One upload submitted to the service.
pub struct UploadRequest {
    pub bucket_id: String,
    /// Remote name the file is stored under.
    pub file_name: String,
    /// Size of `source` in bytes.
    pub size: u64,
    pub source: Box<dyn AsyncRead + Send + Sync + Unpin>,
    pub progress: ProgressCallback,
    /// Cancelled when the operator interrupts this transfer.
    pub cancel: CancellationToken,
}

/// One download submitted to the service. The content is written to `sink`.
pub struct DownloadRequest {
    pub bucket_id: String,
    pub file_id: String,
    pub sink: Box<dyn AsyncWrite + Send + Unpin>,
    pub progress: ProgressCallback,
    pub cancel: CancellationToken,
}

/// Abstract connection to the remote storage service.
pub trait BridgeService: Send + Sync {
    /// Lists every bucket in the account.
    fn get_buckets(&self) -> ServiceFuture<'_, Vec<BucketMeta>>;

    /// Lists the files in a bucket.
    fn list_files(&self, bucket_id: &str) -> ServiceFuture<'_, Vec<FileMeta>>;

    /// Uploads one file and returns its new service id.
    fn store_file(&self, request: UploadRequest) -> ServiceFuture<'_, String>;

    /// Downloads one file into the request's sink.
    fn resolve_file(&self, request: DownloadRequest) -> ServiceFuture<'_, ()>;

    /// Creates a bucket.
    fn create_bucket(&self, name: &str) -> ServiceFuture<'_, BucketMeta>;

    /// Deletes a bucket by id.
    fn delete_bucket(&self, bucket_id: &str) -> ServiceFuture<'_, ()>;

    /// Deletes a file from a bucket by id.
    fn delete_file(&self, bucket_id: &str, file_id: &str) -> ServiceFuture<'_, ()>;

    /// Fetches the service's self-description. Needs no credentials.
    fn get_info(&self) -> ServiceFuture<'_, BridgeInfo>;
}
