//! Scripted in-memory service for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bridge_protocol::{BridgeInfo, BucketMeta, FileMeta, ServiceError};
use bridge_transfer::ProgressCounter;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::service::{BridgeService, DownloadRequest, ServiceFuture, UploadRequest};

const CHUNK: usize = 4;

pub(crate) fn bucket(id: &str, name: &str) -> BucketMeta {
    BucketMeta {
        id: id.into(),
        name: name.into(),
        decrypted: true,
        created: "2017-10-01T00:00:00.000Z".into(),
    }
}

pub(crate) fn file(id: &str, name: &str, content: &[u8]) -> FileMeta {
    FileMeta {
        id: id.into(),
        file_name: name.into(),
        size: content.len() as u64,
        decrypted: true,
        mimetype: "application/octet-stream".into(),
        created: "2017-10-01T00:00:00.000Z".into(),
    }
}

/// In-memory bridge. Items are keyed by file id for downloads and by
/// remote name for uploads.
#[derive(Default)]
pub(crate) struct MockBridge {
    buckets: Vec<BucketMeta>,
    bucket_error: Option<ServiceError>,
    files: HashMap<String, Vec<FileMeta>>,
    list_error: Option<ServiceError>,
    contents: HashMap<String, Vec<u8>>,
    item_errors: HashMap<String, ServiceError>,
    hanging: HashSet<String>,
    interrupt: Option<(String, CancellationToken)>,
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    next_id: AtomicUsize,
}

impl MockBridge {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_buckets(mut self, buckets: Vec<BucketMeta>) -> Self {
        self.buckets = buckets;
        self
    }

    pub(crate) fn failing_buckets(mut self, error: ServiceError) -> Self {
        self.bucket_error = Some(error);
        self
    }

    pub(crate) fn with_file(mut self, bucket_id: &str, id: &str, name: &str, content: &[u8]) -> Self {
        self.files
            .entry(bucket_id.to_string())
            .or_default()
            .push(file(id, name, content));
        self.contents.insert(id.to_string(), content.to_vec());
        self
    }

    pub(crate) fn failing_listing(mut self, error: ServiceError) -> Self {
        self.list_error = Some(error);
        self
    }

    /// Fails the transfer (or deletion) of `key` with `error`.
    pub(crate) fn failing_item(mut self, key: &str, error: ServiceError) -> Self {
        self.item_errors.insert(key.to_string(), error);
        self
    }

    /// Never completes the transfer of `key`, ignoring its cancel token.
    pub(crate) fn hanging_item(mut self, key: &str) -> Self {
        self.hanging.insert(key.to_string());
        self
    }

    /// Cancels `token` when the transfer of `key` starts, as an interrupt
    /// signal would, then never completes that transfer.
    pub(crate) fn interrupt_at(mut self, key: &str, token: CancellationToken) -> Self {
        self.interrupt = Some((key.to_string(), token));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }

    /// Highest number of transfers that were open at the same time.
    pub(crate) fn max_concurrent_transfers(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn enter(&self) -> ActiveGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        ActiveGuard(&self.active)
    }

    async fn block_if_scripted(&self, key: &str) {
        if let Some((at, token)) = &self.interrupt {
            if at == key {
                token.cancel();
                std::future::pending::<()>().await;
            }
        }
        if self.hanging.contains(key) {
            std::future::pending::<()>().await;
        }
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BridgeService for MockBridge {
    fn get_buckets(&self) -> ServiceFuture<'_, Vec<BucketMeta>> {
        Box::pin(async move {
            self.record("get_buckets".into());
            match &self.bucket_error {
                Some(e) => Err(e.clone()),
                None => Ok(self.buckets.clone()),
            }
        })
    }

    fn list_files(&self, bucket_id: &str) -> ServiceFuture<'_, Vec<FileMeta>> {
        let bucket_id = bucket_id.to_string();
        Box::pin(async move {
            self.record(format!("list_files:{bucket_id}"));
            match &self.list_error {
                Some(e) => Err(e.clone()),
                None => Ok(self.files.get(&bucket_id).cloned().unwrap_or_default()),
            }
        })
    }

    fn store_file(&self, mut request: UploadRequest) -> ServiceFuture<'_, String> {
        Box::pin(async move {
            let key = request.file_name.clone();
            self.record(format!("store_file:{key}"));
            let _active = self.enter();
            self.block_if_scripted(&key).await;

            let mut data = Vec::new();
            request.source.read_to_end(&mut data).await?;

            let counter = ProgressCounter::new(request.size, request.progress.clone());
            for chunk in data.chunks(CHUNK) {
                counter.advance(chunk.len() as u64);
                tokio::task::yield_now().await;
            }

            if let Some(e) = self.item_errors.get(&key) {
                return Err(e.clone());
            }
            counter.finish();

            self.uploads.lock().unwrap().push((key, data));
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("uploaded-{n}"))
        })
    }

    fn resolve_file(&self, mut request: DownloadRequest) -> ServiceFuture<'_, ()> {
        Box::pin(async move {
            let key = request.file_id.clone();
            self.record(format!("resolve_file:{key}"));
            let _active = self.enter();
            self.block_if_scripted(&key).await;

            if let Some(e) = self.item_errors.get(&key) {
                return Err(e.clone());
            }
            let data = self.contents.get(&key).ok_or(ServiceError::NotFound)?;

            let counter = ProgressCounter::new(data.len() as u64, request.progress.clone());
            for chunk in data.chunks(CHUNK) {
                request.sink.write_all(chunk).await?;
                counter.advance(chunk.len() as u64);
                tokio::task::yield_now().await;
            }
            request.sink.flush().await?;
            counter.finish();
            Ok(())
        })
    }

    fn create_bucket(&self, name: &str) -> ServiceFuture<'_, BucketMeta> {
        let name = name.to_string();
        Box::pin(async move {
            self.record(format!("create_bucket:{name}"));
            Ok(bucket("created", &name))
        })
    }

    fn delete_bucket(&self, bucket_id: &str) -> ServiceFuture<'_, ()> {
        let bucket_id = bucket_id.to_string();
        Box::pin(async move {
            self.record(format!("delete_bucket:{bucket_id}"));
            Ok(())
        })
    }

    fn delete_file(&self, bucket_id: &str, file_id: &str) -> ServiceFuture<'_, ()> {
        let bucket_id = bucket_id.to_string();
        let file_id = file_id.to_string();
        Box::pin(async move {
            self.record(format!("delete_file:{bucket_id}:{file_id}"));
            match self.item_errors.get(&file_id) {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        })
    }

    fn get_info(&self) -> ServiceFuture<'_, BridgeInfo> {
        Box::pin(async move {
            self.record("get_info".into());
            Ok(BridgeInfo {
                title: "Mock Bridge".into(),
                description: "in-memory".into(),
                version: "1.0.0".into(),
                host: "localhost".into(),
            })
        })
    }
}
