//! Record collection contract.
//!
//! Credential and bucket metadata are each one named collection of
//! records keyed by name.  The [`Collection`] trait is the only thing the
//! stores above it see, so the JSON-array file can later be swapped for
//! an embedded key-value store without touching callers.
//!
//! Implementations must serialize every call behind a single lock: an
//! `insert` checks for the key and appends in one critical section, which
//! is what makes name uniqueness hold under concurrent requests.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{Resource, StoreFuture};

/// A persisted record with a unique string key.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name, also used for the backing file stem.
    const COLLECTION: &'static str;

    /// Resource kind reported in `Conflict` / `NotFound` errors.
    const RESOURCE: Resource;

    /// Primary key.
    fn key(&self) -> &str;
}

/// Get / insert / remove / list over one named collection.
pub trait Collection<R: Record>: Send + Sync + 'static {
    /// Fetch the first record whose key matches.
    fn get(&self, key: &str) -> StoreFuture<'_, Option<R>>;

    /// Append a record, failing with `Conflict` if the key is taken.
    fn insert(&self, record: R) -> StoreFuture<'_, ()>;

    /// Remove the first record whose key matches. Returns whether one was
    /// removed; a missing key is not an error.
    fn remove(&self, key: &str) -> StoreFuture<'_, bool>;

    /// All records in insertion order.
    fn list(&self) -> StoreFuture<'_, Vec<R>>;
}
