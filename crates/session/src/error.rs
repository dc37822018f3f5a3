//! Session error types.

use bridge_protocol::ServiceError;
use bridge_transfer::TransferError;

/// Errors that end a session before or between transfers.
///
/// Per-item transfer failures are not errors here: they are reported as
/// [`ItemOutcome::Failed`](crate::types::ItemOutcome::Failed) and the batch
/// carries on.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("missing {0}")]
    MissingArgument(&'static str),

    #[error("Invalid file path: {0}")]
    InvalidPath(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("Invalid bucket name")]
    InvalidBucketName(String),

    #[error("file [{0}] not found in bucket")]
    FileNotFound(String),

    #[error("bucket lookup failed: {0}")]
    Resolution(ServiceError),

    #[error("file listing failed: {0}")]
    Listing(ServiceError),

    #[error("{0}")]
    Service(ServiceError),

    #[error("work queue error: {0}")]
    QueueFile(#[from] TransferError),

    #[error("canceled")]
    Cancelled,

    #[error("unexpected completion while {0}")]
    UnexpectedCompletion(&'static str),
}

impl SessionError {
    /// The underlying service failure, if this error wraps one.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::Resolution(e) | Self::Listing(e) | Self::Service(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_errors_read_like_the_cli() {
        assert_eq!(
            SessionError::InvalidBucketName("nope".into()).to_string(),
            "Invalid bucket name"
        );
        assert_eq!(
            SessionError::FileNotFound("a.txt".into()).to_string(),
            "file [a.txt] not found in bucket"
        );
    }

    #[test]
    fn unauthorized_resolution_is_not_invalid_name() {
        let err = SessionError::Resolution(ServiceError::Unauthorized);
        assert_ne!(err.to_string(), "Invalid bucket name");
        assert_eq!(err.service_error(), Some(&ServiceError::Unauthorized));
    }

    #[test]
    fn transfer_errors_convert() {
        let err: SessionError = TransferError::InvalidPath("x".into()).into();
        assert!(matches!(err, SessionError::QueueFile(_)));
        assert!(err.service_error().is_none());
    }
}
