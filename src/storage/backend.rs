//! Blob store trait.
//!
//! Every blob backend must implement [`BlobStore`].  Blobs are addressed
//! by `(bucket, relative path)`; the backend owns path confinement but not
//! bucket registration, which [`super::coordinator::FileCoordinator`]
//! enforces before calling in.

use serde::Serialize;
use tokio::io::AsyncRead;

use crate::errors::StoreFuture;

/// Derived facts about a stored blob. Never cached; computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    /// Last path segment.
    pub file_name: String,
    /// Normalized bucket-relative path.
    pub file_path: String,
    /// Extension with its leading dot, or empty.
    pub file_ext: String,
    pub file_size: u64,
}

/// Every blob in one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketListing {
    pub bucket: String,
    pub file_list: Vec<String>,
}

/// An opened blob, ready to stream.
#[derive(Debug)]
pub struct BlobHandle {
    pub file: tokio::fs::File,
    pub info: BlobInfo,
}

/// Async blob storage contract.
pub trait BlobStore: Send + Sync + 'static {
    /// Stream `reader` into `bucket/path`, replacing any existing blob.
    fn save<'a>(
        &'a self,
        bucket: &'a str,
        path: &'a str,
        reader: &'a mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreFuture<'a, BlobInfo>;

    /// Open `bucket/path` for reading.
    fn load<'a>(&'a self, bucket: &'a str, path: &'a str) -> StoreFuture<'a, BlobHandle>;

    /// Remove `bucket/path`. Missing blobs are `NotFound`.
    fn delete<'a>(&'a self, bucket: &'a str, path: &'a str) -> StoreFuture<'a, ()>;

    /// Every blob path under `bucket`, relative and `/`-separated.
    fn list<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, Vec<String>>;

    /// Listings for every bucket directory present under the root.
    fn list_all(&self) -> StoreFuture<'_, Vec<BucketListing>>;

    fn stat<'a>(&'a self, bucket: &'a str, path: &'a str) -> StoreFuture<'a, BlobInfo>;
}
