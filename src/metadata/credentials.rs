//! Access-key credential store.
//!
//! Issues random access/secret key pairs, persists them by name, and
//! verifies incoming pairs.  Verification never errors: any failure to
//! read the collection is logged and reported as "not valid", so an I/O
//! fault and a wrong secret look the same to callers.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::collection::{Collection, Record};
use crate::auth::constant_time_eq;
use crate::errors::{Resource, StoreError, StoreResult};

/// Random bytes behind an access key (32 hex chars).
const ACCESS_KEY_BYTES: usize = 16;
/// Random bytes behind a secret key (64 hex chars).
const SECRET_KEY_BYTES: usize = 32;

/// Persisted as `1` (active) and `-1` (disabled). Any other number reads
/// back as disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum CredentialStatus {
    Active,
    Disabled,
}

impl From<i32> for CredentialStatus {
    fn from(v: i32) -> Self {
        if v == 1 {
            CredentialStatus::Active
        } else {
            CredentialStatus::Disabled
        }
    }
}

impl From<CredentialStatus> for i32 {
    fn from(s: CredentialStatus) -> Self {
        match s {
            CredentialStatus::Active => 1,
            CredentialStatus::Disabled => -1,
        }
    }
}

fn default_status() -> CredentialStatus {
    CredentialStatus::Disabled
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub name: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Empty means "never expires".
    #[serde(default)]
    pub expire_time: String,
    #[serde(default = "default_status")]
    pub status: CredentialStatus,
}

impl Record for CredentialRecord {
    const COLLECTION: &'static str = "access_key";
    const RESOURCE: Resource = Resource::Credential;

    fn key(&self) -> &str {
        &self.name
    }
}

/// A freshly issued key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub access_key: String,
    pub secret_key: String,
}

/// Parse an expiry timestamp: RFC 3339, or `YYYY-MM-DD HH:MM:SS` as UTC.
pub fn parse_expire_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

impl CredentialRecord {
    /// Whether this record may authenticate at `now`.
    fn usable_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != CredentialStatus::Active {
            return false;
        }
        if self.expire_time.is_empty() {
            return true;
        }
        match parse_expire_time(&self.expire_time) {
            Some(expiry) => expiry > now,
            None => {
                warn!(name = %self.name, "credential has unparseable expireTime; refusing it");
                false
            }
        }
    }
}

pub struct CredentialStore {
    records: Arc<dyn Collection<CredentialRecord>>,
}

impl CredentialStore {
    pub fn new(records: Arc<dyn Collection<CredentialRecord>>) -> Self {
        Self { records }
    }

    /// Draw a new access/secret pair from the OS random source.
    pub fn issue(&self) -> StoreResult<KeyPair> {
        let mut access = [0u8; ACCESS_KEY_BYTES];
        let mut secret = [0u8; SECRET_KEY_BYTES];
        OsRng
            .try_fill_bytes(&mut access)
            .map_err(StoreError::CryptoFailure)?;
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(StoreError::CryptoFailure)?;
        Ok(KeyPair {
            access_key: hex::encode(access),
            secret_key: hex::encode(secret),
        })
    }

    /// Persist a record. Fails with `Conflict` if the name is taken.
    pub async fn save(&self, record: CredentialRecord) -> StoreResult<()> {
        if record.name.is_empty() {
            return Err(StoreError::invalid_input("access key name must not be empty"));
        }
        let name = record.name.clone();
        self.records.insert(record).await?;
        info!(name = %name, "access key saved");
        Ok(())
    }

    /// Issue a key pair and save it under `name` as an active credential.
    pub async fn issue_and_save(
        &self,
        name: &str,
        expire_time: &str,
    ) -> StoreResult<CredentialRecord> {
        if name.is_empty() {
            return Err(StoreError::invalid_input("access key name must not be empty"));
        }
        if !expire_time.is_empty() && parse_expire_time(expire_time).is_none() {
            return Err(StoreError::invalid_input(format!(
                "expireTime is not a valid timestamp: {expire_time}"
            )));
        }

        let pair = self.issue()?;
        let record = CredentialRecord {
            name: name.to_string(),
            access_key: pair.access_key,
            secret_key: pair.secret_key,
            expire_time: expire_time.to_string(),
            status: CredentialStatus::Active,
        };
        self.save(record.clone()).await?;
        Ok(record)
    }

    pub async fn get(&self, name: &str) -> StoreResult<CredentialRecord> {
        self.records
            .get(name)
            .await?
            .ok_or_else(|| StoreError::not_found(Resource::Credential, name))
    }

    pub async fn list(&self) -> StoreResult<Vec<CredentialRecord>> {
        self.records.list().await
    }

    /// Remove the credential named `name`. Missing names are not an error.
    pub async fn delete(&self, name: &str) -> StoreResult<()> {
        if self.records.remove(name).await? {
            info!(name = %name, "access key deleted");
        } else {
            debug!(name = %name, "delete of unknown access key ignored");
        }
        Ok(())
    }

    /// True iff an active, unexpired record holds exactly this pair.
    pub async fn verify(&self, access_key: &str, secret_key: &str) -> bool {
        let records = match self.records.list().await {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "could not read credentials; treating key pair as invalid");
                return false;
            }
        };

        let now = Utc::now();
        records.iter().any(|r| {
            r.access_key == access_key
                && constant_time_eq(&r.secret_key, secret_key)
                && r.usable_at(now)
        })
    }
}
