//! HTTP handlers.
//!
//! Handlers translate requests into store calls and wrap the results in
//! the JSON envelope.  They hold no logic of their own beyond parameter
//! checks; every invariant lives in the stores.

pub mod bucket;
pub mod credential;
pub mod file;
pub mod storage;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tokio_util::io::ReaderStream;

use crate::errors::{StoreError, StoreResult};
use crate::storage::backend::BlobHandle;

/// Unwrap a JSON body, turning extractor rejections into `InvalidInput`.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> StoreResult<T> {
    body.map(|Json(v)| v)
        .map_err(|rejection| StoreError::invalid_input(rejection.body_text()))
}

/// Reject an empty required parameter.
pub(crate) fn required<'a>(value: &'a str, field: &str) -> StoreResult<&'a str> {
    if value.is_empty() {
        Err(StoreError::invalid_input(format!("{field} is required")))
    } else {
        Ok(value)
    }
}

/// How a downloaded blob should be presented by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Attachment,
    /// Inline for images and PDFs, attachment for everything else.
    InlineIfViewable,
}

fn is_viewable(mime: &mime_guess::Mime) -> bool {
    mime.type_() == mime_guess::mime::IMAGE
        || (mime.type_() == mime_guess::mime::APPLICATION
            && mime.subtype() == mime_guess::mime::PDF)
}

fn content_disposition(kind: &str, file_name: &str) -> HeaderValue {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded = utf8_percent_encode(file_name, NON_ALPHANUMERIC);
    HeaderValue::from_str(&format!(
        "{kind}; filename=\"{ascii}\"; filename*=UTF-8''{encoded}"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Stream an opened blob back to the client.
pub(crate) fn blob_response(handle: BlobHandle, disposition: Disposition) -> Response {
    let mime = mime_guess::from_path(&handle.info.file_name).first_or_octet_stream();
    let kind = match disposition {
        Disposition::InlineIfViewable if is_viewable(&mime) => "inline",
        _ => "attachment",
    };

    let mut response = Body::from_stream(ReaderStream::new(handle.file)).into_response();
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.essence_str()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(handle.info.file_size));
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(kind, &handle.info.file_name),
    );
    response
}
