//! Name to id resolution.
//!
//! The service has no resolve-by-name endpoint, so a bucket name is
//! resolved by fetching the full bucket list and scanning it. Matching is
//! exact and case-sensitive: a substring or a case variant never matches.

use bridge_protocol::{BucketMeta, FileMeta};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::service::BridgeService;

/// Finds the bucket whose name equals `name` exactly.
pub fn match_bucket<'a>(buckets: &'a [BucketMeta], name: &str) -> Option<&'a BucketMeta> {
    buckets.iter().find(|b| b.name == name)
}

/// Finds the file whose name equals `name` exactly.
pub fn find_file<'a>(files: &'a [FileMeta], name: &str) -> Option<&'a FileMeta> {
    files.iter().find(|f| f.file_name == name)
}

/// Resolves a bucket name with one round trip to the service.
///
/// Used directly by commands that act on a bucket without a session
/// (bucket removal); sessions resolve through [`Session::advance`].
///
/// [`Session::advance`]: crate::machine::Session::advance
pub async fn resolve_bucket(
    service: &dyn BridgeService,
    name: &str,
) -> Result<BucketMeta, SessionError> {
    let buckets = service.get_buckets().await.map_err(|e| {
        warn!(bucket = name, error = %e, "bucket list request failed");
        SessionError::Resolution(e)
    })?;

    let found = match_bucket(&buckets, name).cloned();
    match found {
        Some(bucket) => {
            debug!(bucket = name, id = %bucket.id, "bucket resolved");
            Ok(bucket)
        }
        None => Err(SessionError::InvalidBucketName(name.to_string())),
    }
}
