//! Status taxonomy for bridge calls.
//!
//! Every service call completes with either a value or one of these
//! categories. Zero/2xx means success and never produces a `ServiceError`.

/// Failure category reported by a completed service call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid user credentials")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("invalid request")]
    BadRequest,

    #[error("request failed with status code: {0}")]
    Status(u16),

    #[error(
        "unable to properly decrypt file, please check that the correct encryption key was imported correctly"
    )]
    FileDecryption,

    #[error("transfer canceled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("local I/O error: {0}")]
    Io(String),
}

impl ServiceError {
    /// Maps an HTTP status to a failure category.
    ///
    /// Returns `None` for 2xx and 304 (not modified), which count as success.
    pub fn from_http_status(status: u16) -> Option<Self> {
        match status {
            200..=299 | 304 => None,
            400 => Some(Self::BadRequest),
            401 | 403 => Some(Self::Unauthorized),
            404 => Some(Self::NotFound),
            other => Some(Self::Status(other)),
        }
    }

    /// Stable nonzero numeric code, used in structured logs.
    pub fn code(&self) -> i32 {
        match self {
            Self::Unauthorized => 1001,
            Self::NotFound => 1002,
            Self::BadRequest => 1003,
            Self::Status(_) => 1000,
            Self::FileDecryption => 3001,
            Self::Cancelled => 4001,
            Self::Transport(_) => 2001,
            Self::Protocol(_) => 2002,
            Self::Io(_) => 5001,
        }
    }

    /// Whether this failure came from the operator interrupting the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}
