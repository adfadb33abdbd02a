//! Bucket registry.
//!
//! Buckets are pure metadata: creating one does not touch the blob tree,
//! and deleting one leaves any stored blobs on disk.  A bucket name ends
//! up as a directory under the storage root, so it must be a single plain
//! path segment and must not contain the reserved storage-root token.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::collection::{Collection, Record};
use crate::errors::{Resource, StoreError, StoreResult};

pub const DEFAULT_ACCESS_POLICY: &str = "private";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRecord {
    pub name: String,
    #[serde(default)]
    pub access_policy: String,
    /// Free-form; stored and returned but not interpreted.
    #[serde(default)]
    pub storage_type: String,
}

impl Record for BucketRecord {
    const COLLECTION: &'static str = "bucket";
    const RESOURCE: Resource = Resource::Bucket;

    fn key(&self) -> &str {
        &self.name
    }
}

/// Check that `name` is usable as a bucket.
///
/// Empty names are `InvalidInput`; everything else that could not be a
/// single directory under the root, or that contains `reserved_token`, is
/// `InvalidName`.
pub fn validate_bucket_name(name: &str, reserved_token: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::invalid_input("bucket name must not be empty"));
    }

    let illegal = (!reserved_token.is_empty() && name.contains(reserved_token))
        || name == "."
        || name == ".."
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.chars().any(char::is_control);

    if illegal {
        warn!(bucket = %name, "rejected illegal bucket name");
        return Err(StoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

pub struct BucketRegistry {
    records: Arc<dyn Collection<BucketRecord>>,
    reserved_token: String,
}

impl BucketRegistry {
    pub fn new(records: Arc<dyn Collection<BucketRecord>>, reserved_token: impl Into<String>) -> Self {
        Self {
            records,
            reserved_token: reserved_token.into(),
        }
    }

    /// Register a bucket. An empty `access_policy` becomes `"private"`.
    pub async fn create(
        &self,
        name: &str,
        access_policy: &str,
        storage_type: &str,
    ) -> StoreResult<BucketRecord> {
        validate_bucket_name(name, &self.reserved_token)?;

        let record = BucketRecord {
            name: name.to_string(),
            access_policy: if access_policy.is_empty() {
                DEFAULT_ACCESS_POLICY.to_string()
            } else {
                access_policy.to_string()
            },
            storage_type: storage_type.to_string(),
        };
        self.records.insert(record.clone()).await?;
        info!(bucket = %name, policy = %record.access_policy, "bucket created");
        Ok(record)
    }

    pub async fn get(&self, name: &str) -> StoreResult<BucketRecord> {
        let found = self.records.get(name).await?;
        debug!(bucket = %name, found = found.is_some(), "bucket lookup");
        found.ok_or_else(|| StoreError::not_found(Resource::Bucket, name))
    }

    pub async fn list(&self) -> StoreResult<Vec<BucketRecord>> {
        self.records.list().await
    }

    /// Unregister a bucket. Unknown names succeed silently.
    pub async fn delete(&self, name: &str) -> StoreResult<()> {
        if self.records.remove(name).await? {
            info!(bucket = %name, "bucket deleted");
        } else {
            debug!(bucket = %name, "delete of unknown bucket ignored");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::json_file::JsonFileCollection;
    use crate::metadata::memory::MemoryCollection;

    fn registry() -> BucketRegistry {
        BucketRegistry::new(Arc::new(MemoryCollection::<BucketRecord>::new()), "storage")
    }

    #[tokio::test]
    async fn test_create_defaults_to_private() {
        let reg = registry();
        let rec = reg.create("photos", "", "").await.unwrap();
        assert_eq!(rec.access_policy, "private");
        assert_eq!(reg.get("photos").await.unwrap(), rec);
    }

    #[tokio::test]
    async fn test_create_keeps_given_policy() {
        let reg = registry();
        let rec = reg.create("docs", "public-read", "local").await.unwrap();
        assert_eq!(rec.access_policy, "public-read");
        assert_eq!(rec.storage_type, "local");
    }

    #[tokio::test]
    async fn test_reserved_token_rejected() {
        let reg = registry();
        let err = reg.create("storage-x", "", "").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName { .. }));
        let err = reg.create("mystorage", "", "").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName { .. }));
        assert!(reg.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_validate_bucket_name() {
        assert!(validate_bucket_name("photos", "storage").is_ok());
        assert!(validate_bucket_name("my-bucket_1", "storage").is_ok());
        assert!(matches!(
            validate_bucket_name("", "storage"),
            Err(StoreError::InvalidInput { .. })
        ));
        for bad in ["a/b", "a\\b", ".", "..", ".hidden", "tab\there", "x-storage"] {
            assert!(
                matches!(
                    validate_bucket_name(bad, "storage"),
                    Err(StoreError::InvalidName { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_duplicate_conflicts() {
        let reg = registry();
        reg.create("photos", "", "").await.unwrap();
        let err = reg.create("photos", "public", "").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                resource: Resource::Bucket,
                ..
            }
        ));
        assert_eq!(reg.get("photos").await.unwrap().access_policy, "private");
    }

    #[tokio::test]
    async fn test_get_missing() {
        let reg = registry();
        assert!(reg
            .get("nope")
            .await
            .unwrap_err()
            .is_not_found(Resource::Bucket));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let reg = registry();
        reg.create("photos", "", "").await.unwrap();
        reg.delete("photos").await.unwrap();
        reg.delete("photos").await.unwrap();
        reg.delete("ghost").await.unwrap();
        assert!(reg.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let reg = registry();
        for name in ["c", "a", "b"] {
            reg.create(name, "", "").await.unwrap();
        }
        let names: Vec<String> = reg.list().await.unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_single_winner() {
        let tmp = tempfile::TempDir::new().unwrap();
        let coll = Arc::new(JsonFileCollection::<BucketRecord>::open(tmp.path()).unwrap());
        let reg = Arc::new(BucketRegistry::new(coll, "storage"));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move { reg.create("race", "", "").await }));
        }

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::Conflict { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(reg.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        {
            let coll = Arc::new(JsonFileCollection::<BucketRecord>::open(tmp.path()).unwrap());
            let reg = BucketRegistry::new(coll, "storage");
            reg.create("photos", "", "").await.unwrap();
        }
        let raw = std::fs::read_to_string(tmp.path().join("bucket.json")).unwrap();
        assert!(raw.contains("\"accessPolicy\":\"private\""));

        let coll = Arc::new(JsonFileCollection::<BucketRecord>::open(tmp.path()).unwrap());
        let reg = BucketRegistry::new(coll, "storage");
        assert_eq!(reg.get("photos").await.unwrap().name, "photos");
    }
}
