pub mod status;
pub mod types;

// Re-export primary types for convenience.
pub use status::ServiceError;
pub use types::{BridgeInfo, BucketMeta, FileMeta};
