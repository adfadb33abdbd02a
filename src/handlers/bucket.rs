//! Bucket handlers: `/bucket/*`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use super::{json_body, required};
use crate::envelope;
use crate::errors::StoreError;
use crate::metrics::BUCKETS_TOTAL;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBucketRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub access_policy: String,
    #[serde(default)]
    pub storage_type: String,
}

#[derive(Debug, Deserialize)]
pub struct BucketQuery {
    #[serde(default)]
    pub bucket: String,
}

/// Refresh the bucket gauge after a mutation. Failures only cost a stale gauge.
async fn record_bucket_count(state: &AppState) {
    match state.buckets.list().await {
        Ok(buckets) => metrics::gauge!(BUCKETS_TOTAL).set(buckets.len() as f64),
        Err(err) => warn!(error = %err, "could not refresh bucket gauge"),
    }
}

/// `POST /bucket/create`
pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateBucketRequest>, JsonRejection>,
) -> Result<Response, StoreError> {
    let req = json_body(body)?;
    let record = state
        .buckets
        .create(&req.name, &req.access_policy, &req.storage_type)
        .await?;
    record_bucket_count(&state).await;
    Ok(envelope::success("bucket created", record))
}

/// `GET /bucket/list`
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Response, StoreError> {
    let buckets = state.buckets.list().await?;
    Ok(envelope::success("ok", buckets))
}

/// `GET /bucket/info?bucket=`
pub async fn info(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BucketQuery>,
) -> Result<Response, StoreError> {
    let name = required(&query.bucket, "bucket")?;
    let record = state.buckets.get(name).await?;
    Ok(envelope::success("ok", record))
}

/// `DELETE /bucket/delete?bucket=` -- unregisters; stored blobs stay on disk.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BucketQuery>,
) -> Result<Response, StoreError> {
    let name = required(&query.bucket, "bucket")?;
    state.buckets.delete(name).await?;
    record_bucket_count(&state).await;
    Ok(envelope::done("bucket deleted"))
}
