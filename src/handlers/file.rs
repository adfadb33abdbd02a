//! File handlers: `/file/*`.

use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;

use super::{blob_response, required, Disposition};
use crate::envelope;
use crate::errors::StoreError;
use crate::storage::naming;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub filename: String,
}

/// Upload result returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub bucket: String,
    pub original_name: String,
    pub file_name: String,
    pub file_url: String,
    pub file_ext: String,
    pub file_size: u64,
}

/// Map a multipart failure, keeping body-limit overruns apart from
/// malformed forms.
fn bad_multipart(err: &MultipartError, limit: u64) -> StoreError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return StoreError::TooLarge { limit };
    }
    StoreError::invalid_input(format!("malformed multipart body: {}", err.body_text()))
}

/// A failed streaming save whose cause is the multipart body itself.
fn upload_stream_error(err: StoreError, limit: u64) -> StoreError {
    if let StoreError::Io(io) = &err {
        if let Some(multipart) = io
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
        {
            return bad_multipart(multipart, limit);
        }
    }
    err
}

async fn text_field(field: Field<'_>, limit: u64) -> Result<String, StoreError> {
    field.text().await.map_err(|e| bad_multipart(&e, limit))
}

/// Public URL of a stored blob.
pub fn file_url(public_url: &str, bucket: &str, file_name: &str) -> String {
    format!(
        "{}/storage/{}/{}",
        public_url.trim_end_matches('/'),
        bucket,
        file_name
    )
}

/// `POST /file/upload` (multipart: `bucket`, `savePath`, `saveName`, `file`).
///
/// The file part is streamed straight to disk, so the text fields must
/// come before it in the form.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, StoreError> {
    let mut bucket = String::new();
    let mut save_path = String::new();
    let mut save_name = String::new();
    let limit = state.config.server.max_upload_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_multipart(&e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "bucket" => bucket = text_field(field, limit).await?,
            "savePath" => save_path = text_field(field, limit).await?,
            "saveName" => save_name = text_field(field, limit).await?,
            "file" => {
                let bucket = required(&bucket, "bucket")
                    .map_err(|_| StoreError::invalid_input("bucket field must precede file"))?
                    .to_string();
                let original_name = field.file_name().unwrap_or_default().to_string();
                required(&original_name, "file name")?;
                let object_name =
                    naming::upload_object_name(&original_name, &save_path, &save_name);

                let stream = field.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e));
                let reader = StreamReader::new(stream);
                futures::pin_mut!(reader);
                let info = state
                    .files
                    .save(&bucket, &object_name, &mut reader)
                    .await
                    .map_err(|e| upload_stream_error(e, limit))?;

                let result = UploadResult {
                    file_url: file_url(&state.config.server.public_url, &bucket, &info.file_path),
                    bucket,
                    original_name,
                    file_name: info.file_path,
                    file_ext: info.file_ext,
                    file_size: info.file_size,
                };
                return Ok(envelope::success("file uploaded", result));
            }
            _ => {}
        }
    }

    Err(StoreError::invalid_input("file is required"))
}

/// `GET /file/download?bucket=&filename=`
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Response, StoreError> {
    let bucket = required(&query.bucket, "bucket")?;
    let filename = required(&query.filename, "filename")?;
    let handle = state.files.load(bucket, filename).await?;
    Ok(blob_response(handle, Disposition::Attachment))
}

/// `GET /file/list?bucket=`
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Response, StoreError> {
    let bucket = required(&query.bucket, "bucket")?;
    let files = state.files.list(bucket).await?;
    Ok(envelope::success("ok", files))
}

/// `GET /file/list-all`
pub async fn list_all(State(state): State<Arc<AppState>>) -> Result<Response, StoreError> {
    let listings = state.files.list_all().await?;
    Ok(envelope::success("ok", listings))
}

/// `GET /file/info?bucket=&filename=`
pub async fn info(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Response, StoreError> {
    let bucket = required(&query.bucket, "bucket")?;
    let filename = required(&query.filename, "filename")?;
    let info = state.files.stat(bucket, filename).await?;
    Ok(envelope::success("ok", info))
}

/// `DELETE /file/delete?bucket=&filename=`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Response, StoreError> {
    let bucket = required(&query.bucket, "bucket")?;
    let filename = required(&query.filename, "filename")?;
    state.files.delete(bucket, filename).await?;
    Ok(envelope::done("file deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url() {
        assert_eq!(
            file_url("http://localhost:18088/", "photos", "a/b.png"),
            "http://localhost:18088/storage/photos/a/b.png"
        );
        assert_eq!(
            file_url("https://cdn.example.com", "b", "x.txt"),
            "https://cdn.example.com/storage/b/x.txt"
        );
    }
}
