//! In-memory collection.
//!
//! Holds records in a `Mutex<Vec<_>>` with no persistence. Useful for
//! testing and ephemeral deployments.

use std::sync::{Mutex, MutexGuard};

use super::collection::{Collection, Record};
use crate::errors::{StoreError, StoreFuture, StoreResult};

pub struct MemoryCollection<R: Record> {
    records: Mutex<Vec<R>>,
}

impl<R: Record> MemoryCollection<R> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    fn records(&self) -> StoreResult<MutexGuard<'_, Vec<R>>> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("{} collection lock poisoned", R::COLLECTION).into())
    }
}

impl<R: Record> Default for MemoryCollection<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Collection<R> for MemoryCollection<R> {
    fn get(&self, key: &str) -> StoreFuture<'_, Option<R>> {
        let key = key.to_string();
        Box::pin(async move {
            let records = self.records()?;
            Ok(records.iter().find(|r| r.key() == key).cloned())
        })
    }

    fn insert(&self, record: R) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut records = self.records()?;
            if records.iter().any(|r| r.key() == record.key()) {
                return Err(StoreError::conflict(R::RESOURCE, record.key()));
            }
            records.push(record);
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> StoreFuture<'_, bool> {
        let key = key.to_string();
        Box::pin(async move {
            let mut records = self.records()?;
            match records.iter().position(|r| r.key() == key) {
                Some(idx) => {
                    records.remove(idx);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn list(&self) -> StoreFuture<'_, Vec<R>> {
        Box::pin(async move { Ok(self.records()?.clone()) })
    }
}
