//! Direct blob access: `GET /storage/{bucket}/{path}`.
//!
//! This is the URL handed out as `fileUrl` on upload.  Buckets with a
//! public policy are readable without keys; everything else needs a valid
//! key pair, checked here rather than by the route middleware.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use tracing::warn;

use super::{blob_response, Disposition};
use crate::auth;
use crate::errors::StoreError;
use crate::AppState;

pub async fn serve(
    State(state): State<Arc<AppState>>,
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, StoreError> {
    let record = state.buckets.get(&bucket).await?;

    if !auth::is_public_policy(&record.access_policy) {
        let keys = auth::extract_keys(&headers)?;
        if !state
            .credentials
            .verify(&keys.access_key, &keys.secret_key)
            .await
        {
            warn!(bucket = %bucket, "rejected key pair on private bucket download");
            return Err(StoreError::Unauthorized {
                message: "invalid access key or secret key".to_string(),
            });
        }
    }

    let handle = state.files.load(&bucket, &path).await?;
    Ok(blob_response(handle, Disposition::InlineIfViewable))
}
