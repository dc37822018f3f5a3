//! REST adapter for the bridge service.
//!
//! Implements [`BridgeService`] over `reqwest` with HTTP basic auth.
//! Listings are JSON; file contents are streamed in both directions.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use bridge_protocol::{BridgeInfo, BucketMeta, FileMeta, ServiceError};
use bridge_session::{BridgeService, DownloadRequest, ServiceFuture, UploadRequest};
use bridge_transfer::ProgressCounter;
use futures_util::{StreamExt, TryStreamExt};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Body, Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{CliConfig, Credentials};

/// Status the bridge answers with when content cannot be decrypted.
const DECRYPTION_FAILED: u16 = 422;

/// Characters left as-is in a path segment (RFC 3986 unreserved).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Deserialize)]
struct StoredFile {
    id: String,
}

#[derive(Deserialize)]
struct InfoResponse {
    #[serde(default)]
    info: InfoBody,
    #[serde(default)]
    host: String,
}

#[derive(Deserialize, Default)]
struct InfoBody {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: String,
}

/// HTTP client for one bridge.
pub struct HttpBridge {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl HttpBridge {
    /// Builds a client for `config.bridge_url`. Requests carry basic auth
    /// when `credentials` is set.
    pub fn new(config: &CliConfig, credentials: Option<&Credentials>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        builder = match &config.proxy {
            Some(proxy) => builder.proxy(
                reqwest::Proxy::all(proxy).with_context(|| format!("invalid proxy url: {proxy}"))?,
            ),
            None => builder.no_proxy(),
        };
        let http = builder.build().context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.bridge_url.clone(),
            credentials: credentials.cloned(),
        })
    }

    /// Joins percent-encoded `segments` onto the base URL's path.
    fn url(&self, segments: &[&str]) -> Url {
        let mut path = self.base_url.path().trim_end_matches('/').to_string();
        for segment in segments {
            path.push('/');
            path.push_str(&utf8_percent_encode(segment, SEGMENT).to_string());
        }
        let mut url = self.base_url.clone();
        url.set_path(&path);
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let request = self.http.request(method, self.url(segments));
        match &self.credentials {
            Some(c) => request.basic_auth(&c.user, Some(&c.password)),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ServiceError> {
        let resp = send(self.request(Method::GET, segments)).await?;
        json(resp).await
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ServiceError> {
    let resp = request.send().await.map_err(transport)?;
    check(resp)
}

fn check(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status().as_u16();
    match ServiceError::from_http_status(status) {
        Some(e) => {
            debug!(status, url = %resp.url(), "bridge request failed");
            Err(e)
        }
        None => Ok(resp),
    }
}

async fn json<T: DeserializeOwned>(resp: Response) -> Result<T, ServiceError> {
    let body = resp.bytes().await.map_err(transport)?;
    Ok(serde_json::from_slice(&body)?)
}

fn transport(e: reqwest::Error) -> ServiceError {
    ServiceError::Transport(e.to_string())
}

/// Runs `call` unless `cancel` fires first.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ServiceError::Cancelled),
        result = call => result,
    }
}

impl BridgeService for HttpBridge {
    fn get_buckets(&self) -> ServiceFuture<'_, Vec<BucketMeta>> {
        Box::pin(async move { self.get_json(&["buckets"]).await })
    }

    fn list_files(&self, bucket_id: &str) -> ServiceFuture<'_, Vec<FileMeta>> {
        let bucket_id = bucket_id.to_string();
        Box::pin(async move { self.get_json(&["buckets", &bucket_id, "files"]).await })
    }

    fn store_file(&self, request: UploadRequest) -> ServiceFuture<'_, String> {
        Box::pin(async move {
            let UploadRequest {
                bucket_id,
                file_name,
                size,
                source,
                progress,
                cancel,
            } = request;

            let counter = Arc::new(ProgressCounter::new(size, progress));
            let tally = Arc::clone(&counter);
            let body = ReaderStream::new(source).map_ok(move |chunk| {
                tally.advance(chunk.len() as u64);
                chunk
            });

            let upload = async move {
                let resp = send(
                    self.request(Method::PUT, &["buckets", &bucket_id, "files", &file_name])
                        .body(Body::wrap_stream(body)),
                )
                .await?;
                let stored: StoredFile = json(resp).await?;
                counter.finish();
                Ok::<_, ServiceError>(stored.id)
            };
            until_cancelled(&cancel, upload).await
        })
    }

    fn resolve_file(&self, request: DownloadRequest) -> ServiceFuture<'_, ()> {
        Box::pin(async move {
            let DownloadRequest {
                bucket_id,
                file_id,
                mut sink,
                progress,
                cancel,
            } = request;

            let download = async move {
                let resp = self
                    .request(
                        Method::GET,
                        &["buckets", &bucket_id, "files", &file_id, "content"],
                    )
                    .send()
                    .await
                    .map_err(transport)?;
                if resp.status().as_u16() == DECRYPTION_FAILED {
                    return Err(ServiceError::FileDecryption);
                }
                let resp = check(resp)?;

                let counter = ProgressCounter::new(resp.content_length().unwrap_or(0), progress);
                let mut stream = resp.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(transport)?;
                    sink.write_all(&chunk).await?;
                    counter.advance(chunk.len() as u64);
                }
                sink.flush().await?;
                counter.finish();
                Ok::<_, ServiceError>(())
            };
            until_cancelled(&cancel, download).await
        })
    }

    fn create_bucket(&self, name: &str) -> ServiceFuture<'_, BucketMeta> {
        let body = serde_json::json!({ "name": name });
        Box::pin(async move {
            let resp = send(self.request(Method::POST, &["buckets"]).json(&body)).await?;
            json(resp).await
        })
    }

    fn delete_bucket(&self, bucket_id: &str) -> ServiceFuture<'_, ()> {
        let bucket_id = bucket_id.to_string();
        Box::pin(async move {
            send(self.request(Method::DELETE, &["buckets", &bucket_id])).await?;
            Ok(())
        })
    }

    fn delete_file(&self, bucket_id: &str, file_id: &str) -> ServiceFuture<'_, ()> {
        let bucket_id = bucket_id.to_string();
        let file_id = file_id.to_string();
        Box::pin(async move {
            send(self.request(Method::DELETE, &["buckets", &bucket_id, "files", &file_id]))
                .await?;
            Ok(())
        })
    }

    fn get_info(&self) -> ServiceFuture<'_, BridgeInfo> {
        Box::pin(async move {
            let resp: InfoResponse = self.get_json(&[]).await?;
            Ok(BridgeInfo {
                title: resp.info.title,
                description: resp.info.description,
                version: resp.info.version,
                host: resp.host,
            })
        })
    }
}
