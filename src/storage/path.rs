//! Bucket-relative path resolution.
//!
//! Every client-supplied path is normalized lexically before it is joined
//! onto the storage root: `.` and empty segments are dropped, `..` pops a
//! segment, and a `..` that would pop past the bucket root is rejected.
//! Nothing here touches the filesystem, so a rejected path never causes a
//! syscall.

use std::path::{Path, PathBuf};

use crate::errors::{StoreError, StoreResult};

/// File name prefix of in-flight writes. Listings skip it, so clients may
/// not use it.
pub const TEMP_PREFIX: &str = ".stashbox-tmp-";

/// A path that has passed confinement checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute on-disk location, `{root}/{bucket}/{relative}`.
    pub full: PathBuf,
    /// Normalized bucket-relative path, `/`-separated.
    pub relative: String,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    reserved_token: String,
}

/// Lexically normalize a bucket-relative path.
///
/// Backslashes count as separators.  Absolute paths and paths that climb
/// out of the bucket are `PathViolation`; a path that normalizes to
/// nothing is `InvalidInput`.
pub fn normalize(raw: &str) -> StoreResult<String> {
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(StoreError::path_violation(raw, "absolute path"));
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if parts.pop().is_none() {
                    return Err(StoreError::path_violation(raw, "escapes bucket root"));
                }
            }
            _ => parts.push(part),
        }
    }

    if parts.is_empty() {
        return Err(StoreError::invalid_input("file path must not be empty"));
    }
    Ok(parts.join("/"))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>, reserved_token: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            reserved_token: reserved_token.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{bucket}`, after checking the bucket is one plain segment.
    pub fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty() {
            return Err(StoreError::invalid_input("bucket name must not be empty"));
        }
        if bucket == "."
            || bucket == ".."
            || bucket.contains('/')
            || bucket.contains('\\')
            || bucket.chars().any(char::is_control)
        {
            return Err(StoreError::path_violation(bucket, "bucket is not a single segment"));
        }
        Ok(self.root.join(bucket))
    }

    /// Resolve `relative` inside `bucket`.
    pub fn resolve(&self, bucket: &str, relative: &str) -> StoreResult<ResolvedPath> {
        let dir = self.bucket_dir(bucket)?;
        let relative = normalize(relative)?;
        let mut full = dir;
        for segment in relative.split('/') {
            full.push(segment);
        }
        Ok(ResolvedPath { full, relative })
    }

    /// Resolve a name the client chose for a new blob.
    ///
    /// On top of [`resolve`](Self::resolve), the normalized path must not
    /// contain the reserved storage-root token.
    pub fn resolve_for_write(&self, bucket: &str, relative: &str) -> StoreResult<ResolvedPath> {
        let resolved = self.resolve(bucket, relative)?;
        self.check_client_name(&resolved.relative)?;
        Ok(resolved)
    }

    pub fn check_client_name(&self, normalized: &str) -> StoreResult<()> {
        if !self.reserved_token.is_empty() && normalized.contains(&self.reserved_token) {
            return Err(StoreError::path_violation(
                normalized,
                "contains reserved storage token",
            ));
        }
        if normalized
            .split('/')
            .any(|segment| segment.starts_with(TEMP_PREFIX))
        {
            return Err(StoreError::path_violation(
                normalized,
                "uses the in-flight write prefix",
            ));
        }
        Ok(())
    }
}
