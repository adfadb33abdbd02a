//! stashbox library -- single-node object storage engine.
//!
//! This crate provides the core components for running a small
//! bucket/file storage server: access-key credentials, a bucket registry,
//! a confined on-disk blob store, and the HTTP layer in front of them.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod metadata;
pub mod metrics;
pub mod server;
pub mod storage;

use crate::config::Config;
use crate::errors::StoreResult;
use crate::metadata::buckets::{BucketRecord, BucketRegistry};
use crate::metadata::credentials::{CredentialRecord, CredentialStore};
use crate::metadata::json_file::JsonFileCollection;
use crate::storage::coordinator::FileCoordinator;
use crate::storage::local::LocalBlobStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Access-key credentials.
    pub credentials: Arc<CredentialStore>,
    /// Registered buckets.
    pub buckets: Arc<BucketRegistry>,
    /// Bucket-checked blob operations.
    pub files: Arc<FileCoordinator>,
}

impl AppState {
    /// Open the credential and bucket collections and the blob root named
    /// in `config`, creating directories and seeding empty collections as
    /// needed.
    pub fn from_config(config: Config) -> StoreResult<Self> {
        let metadata_dir = config.metadata.dir_path();
        let credential_records = JsonFileCollection::<CredentialRecord>::open(&metadata_dir)?;
        let bucket_records = JsonFileCollection::<BucketRecord>::open(&metadata_dir)?;
        let credentials = Arc::new(CredentialStore::new(Arc::new(credential_records)));
        let buckets = Arc::new(BucketRegistry::new(
            Arc::new(bucket_records),
            config.storage.reserved_token.clone(),
        ));
        let blobs = Arc::new(LocalBlobStore::new(
            config.storage.root_path(),
            config.storage.reserved_token.clone(),
        )?);
        let files = Arc::new(FileCoordinator::new(buckets.clone(), blobs));

        Ok(Self {
            config,
            credentials,
            buckets,
            files,
        })
    }
}
