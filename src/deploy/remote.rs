//! Remote object store trait and shared types.
//!
//! The [`RemoteStore`] trait is the seam between the sync planner and the
//! bucket. Every backend supports the same four operations: list, get, put
//! and delete.
//!
//! The production implementation is [`S3Store`](super::s3::S3Store), which
//! talks to any S3-compatible endpoint. [`MemoryStore`](super::memory::MemoryStore)
//! keeps objects in memory for tests and rehearsals.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("request for {key} failed: {message}")]
    Request { key: String, message: String },
    #[error("request for {key} returned HTTP {status}")]
    Status { key: String, status: u16 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Worth retrying: transport failures, throttling and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Request { .. } => true,
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Io(_) => false,
        }
    }
}

/// One listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
}

/// A bucket-like key/value store.
///
/// `Sync` so uploads can run from a rayon pool against one shared store.
pub trait RemoteStore: Sync {
    /// Every object in the store.
    fn list(&self) -> Result<Vec<RemoteObject>, RemoteError>;

    /// Object contents, `None` when the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError>;

    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), RemoteError>;

    fn delete(&self, key: &str) -> Result<(), RemoteError>;
}
