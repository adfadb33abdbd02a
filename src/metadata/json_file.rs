//! JSON array file collection.
//!
//! The whole collection lives in one file holding a JSON array.  Every
//! call re-reads the file and every mutation rewrites it in full; there is
//! no in-memory cache, so the file is the source of truth.  Rewrites go
//! through a temp file in the same directory and are persisted by rename.

use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::NamedTempFile;
use tracing::debug;

use super::collection::{Collection, Record};
use crate::errors::{StoreError, StoreFuture, StoreResult};

pub struct JsonFileCollection<R: Record> {
    path: PathBuf,
    lock: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> JsonFileCollection<R> {
    /// Open the collection file `{dir}/{R::COLLECTION}.json`.
    ///
    /// The directory is created if needed and a missing file is seeded
    /// with `[]`.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", R::COLLECTION));
        if !path.exists() {
            std::fs::write(&path, b"[]\n")?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| anyhow::anyhow!("{} collection lock poisoned", R::COLLECTION).into())
    }

    /// Read the whole collection. Absent, empty and `null` files are empty.
    fn read_all(&self) -> StoreResult<Vec<R>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }
        let records: Option<Vec<R>> =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                collection: R::COLLECTION,
                source,
            })?;
        Ok(records.unwrap_or_default())
    }

    fn write_all(&self, records: &[R]) -> StoreResult<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("collection path has no parent directory"))?;
        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(&temp);
            serde_json::to_writer(&mut writer, records).map_err(std::io::Error::from)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        debug!(collection = R::COLLECTION, count = records.len(), "collection rewritten");
        Ok(())
    }
}

impl<R: Record> Collection<R> for JsonFileCollection<R> {
    fn get(&self, key: &str) -> StoreFuture<'_, Option<R>> {
        let key = key.to_string();
        Box::pin(async move {
            let _guard = self.lock()?;
            Ok(self.read_all()?.into_iter().find(|r| r.key() == key))
        })
    }

    fn insert(&self, record: R) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.lock()?;
            let mut records = self.read_all()?;
            if records.iter().any(|r| r.key() == record.key()) {
                return Err(StoreError::conflict(R::RESOURCE, record.key()));
            }
            records.push(record);
            self.write_all(&records)
        })
    }

    fn remove(&self, key: &str) -> StoreFuture<'_, bool> {
        let key = key.to_string();
        Box::pin(async move {
            let _guard = self.lock()?;
            let mut records = self.read_all()?;
            match records.iter().position(|r| r.key() == key) {
                Some(idx) => {
                    records.remove(idx);
                    self.write_all(&records)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<R>> {
        Box::pin(async move {
            let _guard = self.lock()?;
            self.read_all()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Resource;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
        #[serde(default)]
        value: u32,
    }

    impl Record for Item {
        const COLLECTION: &'static str = "item";
        const RESOURCE: Resource = Resource::Bucket;

        fn key(&self) -> &str {
            &self.name
        }
    }

    fn item(name: &str, value: u32) -> Item {
        Item {
            name: name.to_string(),
            value,
        }
    }

    fn test_collection() -> (TempDir, JsonFileCollection<Item>) {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let coll = JsonFileCollection::open(tmp.path()).expect("failed to open collection");
        (tmp, coll)
    }

    #[tokio::test]
    async fn test_open_seeds_empty_array() {
        let (tmp, coll) = test_collection();
        let content = std::fs::read_to_string(tmp.path().join("item.json")).unwrap();
        assert_eq!(content.trim(), "[]");
        assert!(coll.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_null_files_are_empty() {
        let (_tmp, coll) = test_collection();
        std::fs::write(coll.path(), b"").unwrap();
        assert!(coll.list().await.unwrap().is_empty());
        std::fs::write(coll.path(), b"null").unwrap();
        assert!(coll.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_get_and_persistence() {
        let (tmp, coll) = test_collection();
        coll.insert(item("a", 1)).await.unwrap();
        coll.insert(item("b", 2)).await.unwrap();

        let reopened: JsonFileCollection<Item> = JsonFileCollection::open(tmp.path()).unwrap();
        assert_eq!(reopened.get("b").await.unwrap(), Some(item("b", 2)));
        let names: Vec<String> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_insert_duplicate_conflicts() {
        let (_tmp, coll) = test_collection();
        coll.insert(item("a", 1)).await.unwrap();
        let err = coll.insert(item("a", 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(coll.get("a").await.unwrap().unwrap().value, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let (_tmp, coll) = test_collection();
        coll.insert(item("a", 1)).await.unwrap();
        assert!(coll.remove("a").await.unwrap());
        assert!(!coll.remove("a").await.unwrap());
        assert!(coll.get("a").await.unwrap().is_none());
        let content = std::fs::read_to_string(coll.path()).unwrap();
        assert_eq!(content.trim(), "[]");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let (_tmp, coll) = test_collection();
        std::fs::write(coll.path(), b"{not json").unwrap();
        let err = coll.list().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { collection: "item", .. }));
    }

    #[tokio::test]
    async fn test_missing_fields_use_defaults() {
        let (_tmp, coll) = test_collection();
        std::fs::write(coll.path(), br#"[{"name":"x"}]"#).unwrap();
        assert_eq!(coll.get("x").await.unwrap(), Some(item("x", 0)));
    }
}
