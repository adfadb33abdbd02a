//! Local filesystem blob store.
//!
//! Blobs live at `{root}/{bucket}/{relative path}`.  There is no index:
//! listings walk the directory tree and stat reads file metadata.
//!
//! All writes follow crash-only design: write to a hidden temp sibling,
//! fsync, rename.  Temp siblings are skipped by listings.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::backend::{BlobHandle, BlobInfo, BlobStore, BucketListing};
use super::naming;
use super::path::{PathResolver, ResolvedPath, TEMP_PREFIX};
use crate::errors::{Resource, StoreError, StoreFuture, StoreResult};

pub struct LocalBlobStore {
    resolver: PathResolver,
}

impl LocalBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>, reserved_token: impl Into<String>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            resolver: PathResolver::new(root, reserved_token),
        })
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    fn info_for(resolved: &ResolvedPath, size: u64) -> BlobInfo {
        BlobInfo {
            file_name: naming::file_name(&resolved.relative).to_string(),
            file_path: resolved.relative.clone(),
            file_ext: naming::extension(&resolved.relative).to_string(),
            file_size: size,
        }
    }

    /// Metadata of a regular file at `resolved`, or `NotFound`.
    async fn regular_file(
        bucket: &str,
        resolved: &ResolvedPath,
    ) -> StoreResult<std::fs::Metadata> {
        let missing = || StoreError::not_found(Resource::Blob, format!("{bucket}/{}", resolved.relative));
        match tokio::fs::metadata(&resolved.full).await {
            Ok(meta) if meta.is_file() => Ok(meta),
            Ok(_) => Err(missing()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(missing()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomically(
        final_path: &Path,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<u64> {
        let parent = final_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("blob path has no parent directory"))?;
        tokio::fs::create_dir_all(parent).await?;

        let tmp_path = parent.join(format!("{TEMP_PREFIX}{}", uuid::Uuid::new_v4().simple()));
        let result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            let written = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, final_path).await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        match result {
            Ok(written) => Ok(written),
            Err(err) => {
                if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                    if cleanup.kind() != ErrorKind::NotFound {
                        warn!(path = %tmp_path.display(), error = %cleanup, "failed to remove temp file");
                    }
                }
                Err(err.into())
            }
        }
    }
}

/// Depth-first walk of `dir`, returning regular files relative to it.
fn walk_bucket(dir: &Path) -> StoreResult<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if is_broken_link(&err) => {
                warn!(
                    path = %err.path().map(|p| p.display().to_string()).unwrap_or_default(),
                    error = %err,
                    "skipping unreadable symlink during listing"
                );
                continue;
            }
            Err(err) => return Err(std::io::Error::from(err).into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| anyhow::anyhow!("walked outside bucket directory: {e}"))?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        files.push(parts.join("/"));
    }
    Ok(files)
}

/// Dangling symlinks and symlink loops are left out of listings.
fn is_broken_link(err: &walkdir::Error) -> bool {
    err.loop_ancestor().is_some()
        || err
            .io_error()
            .map(|e| e.kind() == ErrorKind::NotFound)
            .unwrap_or(false)
}

/// Bucket directories directly under `root`, sorted, hidden ones skipped.
fn bucket_dirs(root: &Path) -> StoreResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        // Follow symlinks so a linked bucket directory still counts.
        if std::fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

async fn blocking<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("blocking task failed: {e}"))?
}

impl BlobStore for LocalBlobStore {
    fn save<'a>(
        &'a self,
        bucket: &'a str,
        path: &'a str,
        reader: &'a mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreFuture<'a, BlobInfo> {
        Box::pin(async move {
            let resolved = self.resolver.resolve_for_write(bucket, path)?;
            let written = Self::write_atomically(&resolved.full, reader).await?;
            info!(bucket, path = %resolved.relative, bytes = written, "blob saved");
            Ok(Self::info_for(&resolved, written))
        })
    }

    fn load<'a>(&'a self, bucket: &'a str, path: &'a str) -> StoreFuture<'a, BlobHandle> {
        Box::pin(async move {
            let resolved = self.resolver.resolve(bucket, path)?;
            let meta = Self::regular_file(bucket, &resolved).await?;
            let file = tokio::fs::File::open(&resolved.full).await?;
            debug!(bucket, path = %resolved.relative, "blob opened");
            Ok(BlobHandle {
                file,
                info: Self::info_for(&resolved, meta.len()),
            })
        })
    }

    fn delete<'a>(&'a self, bucket: &'a str, path: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let resolved = self.resolver.resolve(bucket, path)?;
            Self::regular_file(bucket, &resolved).await?;
            match tokio::fs::remove_file(&resolved.full).await {
                Ok(()) => {}
                // Lost a race with another delete.
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(StoreError::not_found(
                        Resource::Blob,
                        format!("{bucket}/{}", resolved.relative),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
            info!(bucket, path = %resolved.relative, "blob deleted");
            Ok(())
        })
    }

    fn list<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let dir = self.resolver.bucket_dir(bucket)?;
            blocking(move || walk_bucket(&dir)).await
        })
    }

    fn list_all(&self) -> StoreFuture<'_, Vec<BucketListing>> {
        Box::pin(async move {
            let root = self.root().to_path_buf();
            blocking(move || {
                if !root.is_dir() {
                    return Ok(Vec::new());
                }
                bucket_dirs(&root)?
                    .into_iter()
                    .map(|bucket| {
                        let file_list = walk_bucket(&root.join(&bucket))?;
                        Ok(BucketListing { bucket, file_list })
                    })
                    .collect()
            })
            .await
        })
    }

    fn stat<'a>(&'a self, bucket: &'a str, path: &'a str) -> StoreFuture<'a, BlobInfo> {
        Box::pin(async move {
            let resolved = self.resolver.resolve(bucket, path)?;
            let meta = Self::regular_file(bucket, &resolved).await?;
            Ok(Self::info_for(&resolved, meta.len()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn test_store() -> (TempDir, LocalBlobStore) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let store = LocalBlobStore::new(dir.path(), "storage").expect("failed to create store");
        (dir, store)
    }

    async fn save_bytes(store: &LocalBlobStore, bucket: &str, path: &str, data: &[u8]) -> BlobInfo {
        let mut reader = data;
        store.save(bucket, path, &mut reader).await.unwrap()
    }

    async fn read_all(handle: BlobHandle) -> Vec<u8> {
        let mut file = handle.file;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (_dir, store) = test_store();
        let info = save_bytes(&store, "photos", "a/b.txt", b"hi").await;
        assert_eq!(info.file_size, 2);
        assert_eq!(info.file_path, "a/b.txt");

        let handle = store.load("photos", "a/b.txt").await.unwrap();
        assert_eq!(handle.info.file_size, 2);
        assert_eq!(read_all(handle).await, b"hi");
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let (_dir, store) = test_store();
        save_bytes(&store, "b", "k.bin", b"first version").await;
        save_bytes(&store, "b", "k.bin", b"v2").await;
        let handle = store.load("b", "k.bin").await.unwrap();
        assert_eq!(read_all(handle).await, b"v2");
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_files() {
        let (dir, store) = test_store();
        save_bytes(&store, "b", "x/y.txt", b"data").await;
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("b/x"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_rejected_without_touching_disk() {
        let (dir, store) = test_store();
        let mut reader: &[u8] = b"evil";
        let err = store
            .save("photos", "../../etc/passwd", &mut reader)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PathViolation { .. }));
        assert!(!dir.path().join("photos").exists());

        assert!(matches!(
            store.load("photos", "../../etc/passwd").await,
            Err(StoreError::PathViolation { .. })
        ));
        assert!(matches!(
            store.delete("photos", "../secret").await,
            Err(StoreError::PathViolation { .. })
        ));
        assert!(matches!(
            store.stat("photos", "/etc/hosts").await,
            Err(StoreError::PathViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_rejects_reserved_token() {
        let (_dir, store) = test_store();
        let mut reader: &[u8] = b"x";
        let err = store
            .save("photos", "storage/a.txt", &mut reader)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PathViolation { .. }));
    }

    #[tokio::test]
    async fn test_load_missing_and_directory() {
        let (_dir, store) = test_store();
        save_bytes(&store, "b", "dir/file.txt", b"x").await;

        let err = store.load("b", "nope.txt").await.unwrap_err();
        assert!(err.is_not_found(Resource::Blob));
        let err = store.load("b", "dir").await.unwrap_err();
        assert!(err.is_not_found(Resource::Blob));
    }

    #[tokio::test]
    async fn test_delete_then_load_not_found() {
        let (_dir, store) = test_store();
        save_bytes(&store, "b", "k.txt", b"x").await;
        store.delete("b", "k.txt").await.unwrap();
        assert!(store
            .load("b", "k.txt")
            .await
            .unwrap_err()
            .is_not_found(Resource::Blob));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (_dir, store) = test_store();
        let err = store.delete("b", "ghost.txt").await.unwrap_err();
        assert!(err.is_not_found(Resource::Blob));
    }

    #[tokio::test]
    async fn test_list_recursive_sorted() {
        let (_dir, store) = test_store();
        for path in ["z.txt", "a/b.txt", "a/a/deep.txt", "m.txt"] {
            save_bytes(&store, "b", path, b"x").await;
        }
        let files = store.list("b").await.unwrap();
        assert_eq!(files, vec!["a/a/deep.txt", "a/b.txt", "m.txt", "z.txt"]);
    }

    #[tokio::test]
    async fn test_list_missing_bucket_dir_is_empty() {
        let (_dir, store) = test_store();
        assert!(store.list("never-written").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_temp_files() {
        let (dir, store) = test_store();
        save_bytes(&store, "b", "real.txt", b"x").await;
        std::fs::write(dir.path().join("b").join(format!("{TEMP_PREFIX}abc")), b"partial").unwrap();
        assert_eq!(store.list("b").await.unwrap(), vec!["real.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_survives_broken_and_looping_symlinks() {
        use std::os::unix::fs::symlink;

        let (dir, store) = test_store();
        save_bytes(&store, "photos", "a/b.txt", b"x").await;
        save_bytes(&store, "other", "y.txt", b"y").await;

        let shared = TempDir::new().unwrap();
        std::fs::write(shared.path().join("c.txt"), b"c").unwrap();
        let bucket = dir.path().join("photos");
        symlink("/nonexistent/target", bucket.join("dangling")).unwrap();
        symlink(shared.path(), bucket.join("shared")).unwrap();
        symlink(bucket.join("a"), bucket.join("a/loop")).unwrap();

        assert_eq!(
            store.list("photos").await.unwrap(),
            vec!["a/b.txt", "shared/c.txt"]
        );

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].bucket, "other");
        assert_eq!(all[0].file_list, vec!["y.txt"]);
        assert_eq!(all[1].file_list, vec!["a/b.txt", "shared/c.txt"]);
    }

    #[tokio::test]
    async fn test_list_all() {
        let (dir, store) = test_store();
        save_bytes(&store, "beta", "1.txt", b"x").await;
        save_bytes(&store, "alpha", "x/2.txt", b"x").await;
        std::fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        std::fs::write(dir.path().join("stray-file"), b"x").unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(
            all,
            vec![
                BucketListing {
                    bucket: "alpha".into(),
                    file_list: vec!["x/2.txt".into()],
                },
                BucketListing {
                    bucket: "beta".into(),
                    file_list: vec!["1.txt".into()],
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_stat() {
        let (_dir, store) = test_store();
        save_bytes(&store, "photos", "a/b.txt", b"hi").await;
        let info = store.stat("photos", "a/./b.txt").await.unwrap();
        assert_eq!(
            info,
            BlobInfo {
                file_name: "b.txt".into(),
                file_path: "a/b.txt".into(),
                file_ext: ".txt".into(),
                file_size: 2,
            }
        );
        assert!(store
            .stat("photos", "a/c.txt")
            .await
            .unwrap_err()
            .is_not_found(Resource::Blob));
    }
}
