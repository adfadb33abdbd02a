//! Bucket-checked blob operations.
//!
//! [`FileCoordinator`] is the only place the bucket registry and the blob
//! store meet.  Every per-bucket operation first confirms the bucket is
//! registered, so nothing is written, read, or created on disk for a
//! bucket the registry does not know.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::Mutex;
use tracing::debug;

use super::backend::{BlobHandle, BlobInfo, BlobStore, BucketListing};
use crate::errors::{StoreError, StoreResult};
use crate::metadata::buckets::BucketRegistry;

pub struct FileCoordinator {
    buckets: Arc<BucketRegistry>,
    blobs: Arc<dyn BlobStore>,
    /// Serializes blob operations. Held across the streaming write.
    lock: Mutex<()>,
}

impl FileCoordinator {
    pub fn new(buckets: Arc<BucketRegistry>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            buckets,
            blobs,
            lock: Mutex::new(()),
        }
    }

    async fn require_bucket(&self, bucket: &str) -> StoreResult<()> {
        if bucket.is_empty() {
            return Err(StoreError::invalid_input("bucket name must not be empty"));
        }
        self.buckets.get(bucket).await?;
        Ok(())
    }

    pub async fn save(
        &self,
        bucket: &str,
        path: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<BlobInfo> {
        self.require_bucket(bucket).await?;
        let _guard = self.lock.lock().await;
        let info = self.blobs.save(bucket, path, reader).await?;
        metrics::counter!(crate::metrics::BLOB_BYTES_WRITTEN_TOTAL).increment(info.file_size);
        Ok(info)
    }

    /// Open a blob. The returned handle is read after the lock is released.
    pub async fn load(&self, bucket: &str, path: &str) -> StoreResult<BlobHandle> {
        self.require_bucket(bucket).await?;
        let _guard = self.lock.lock().await;
        self.blobs.load(bucket, path).await
    }

    pub async fn delete(&self, bucket: &str, path: &str) -> StoreResult<()> {
        self.require_bucket(bucket).await?;
        let _guard = self.lock.lock().await;
        self.blobs.delete(bucket, path).await
    }

    pub async fn list(&self, bucket: &str) -> StoreResult<Vec<String>> {
        self.require_bucket(bucket).await?;
        let _guard = self.lock.lock().await;
        let files = self.blobs.list(bucket).await?;
        debug!(bucket, count = files.len(), "listed bucket");
        Ok(files)
    }

    pub async fn stat(&self, bucket: &str, path: &str) -> StoreResult<BlobInfo> {
        self.require_bucket(bucket).await?;
        let _guard = self.lock.lock().await;
        self.blobs.stat(bucket, path).await
    }

    /// Listings for every bucket directory on disk. Needs no bucket check.
    pub async fn list_all(&self) -> StoreResult<Vec<BucketListing>> {
        let _guard = self.lock.lock().await;
        self.blobs.list_all().await
    }
}
