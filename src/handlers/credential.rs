//! Access-key handlers: `/access_key/*`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use super::{json_body, required};
use crate::envelope;
use crate::errors::StoreError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCredentialRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub expire_time: String,
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    #[serde(default)]
    pub name: String,
}

/// `POST /access_key/create` -- issue and save a key pair.
pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateCredentialRequest>, JsonRejection>,
) -> Result<Response, StoreError> {
    let req = json_body(body)?;
    let name = required(&req.name, "name")?;
    let record = state
        .credentials
        .issue_and_save(name, &req.expire_time)
        .await?;
    Ok(envelope::success("access key created", record))
}

/// `GET /access_key/list`
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Response, StoreError> {
    let records = state.credentials.list().await?;
    Ok(envelope::success("ok", records))
}

/// `GET /access_key/info?name=`
pub async fn info(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NameQuery>,
) -> Result<Response, StoreError> {
    let name = required(&query.name, "name")?;
    let record = state.credentials.get(name).await?;
    Ok(envelope::success("ok", record))
}

/// `DELETE /access_key/delete?name=`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NameQuery>,
) -> Result<Response, StoreError> {
    let name = required(&query.name, "name")?;
    state.credentials.delete(name).await?;
    Ok(envelope::done("access key deleted"))
}
