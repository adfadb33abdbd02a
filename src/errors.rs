//! Error taxonomy shared by the stores and the HTTP layer.
//!
//! Every variant maps to an HTTP status and an envelope code.  The enum
//! implements [`axum::response::IntoResponse`] so handlers can simply
//! return `Err(StoreError::NotFound { .. })`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::envelope::{self, ResponseCode};

/// Result alias used by every store operation.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future returned by the object-safe store traits.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Which kind of thing a `Conflict` or `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Credential,
    Bucket,
    Blob,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Resource::Credential => "access key",
            Resource::Bucket => "bucket",
            Resource::Blob => "file",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is missing or malformed.
    #[error("{message}")]
    InvalidInput { message: String },

    /// A record with the same name already exists.
    #[error("{resource} already exists: {name}")]
    Conflict { resource: Resource, name: String },

    /// The credential, bucket or blob does not exist.
    #[error("{resource} does not exist: {name}")]
    NotFound { resource: Resource, name: String },

    /// The bucket name is not allowed.
    #[error("illegal bucket name: {name}")]
    InvalidName { name: String },

    /// A path tried to leave its bucket or collides with the storage root.
    #[error("path rejected ({reason}): {path}")]
    PathViolation { path: String, reason: &'static str },

    /// The operating system random source failed.
    #[error("random source unavailable: {0}")]
    CryptoFailure(#[source] rand::Error),

    /// The request body is over `server.max_upload_size`.
    #[error("upload exceeds the {limit}-byte limit")]
    TooLarge { limit: u64 },

    /// Missing or invalid access-key pair.
    #[error("{message}")]
    Unauthorized { message: String },

    /// A collection file exists but does not hold a JSON array of records.
    #[error("{collection} collection is corrupt: {source}")]
    Corrupt {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StoreError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn not_found(resource: Resource, name: impl Into<String>) -> Self {
        StoreError::NotFound {
            resource,
            name: name.into(),
        }
    }

    pub fn conflict(resource: Resource, name: impl Into<String>) -> Self {
        StoreError::Conflict {
            resource,
            name: name.into(),
        }
    }

    /// Build a `PathViolation` and log it; these are security relevant.
    pub fn path_violation(path: impl Into<String>, reason: &'static str) -> Self {
        let path = path.into();
        warn!(path = %path, reason, "rejected unsafe storage path");
        StoreError::PathViolation { path, reason }
    }

    /// True when this is a `NotFound` for the given resource kind.
    pub fn is_not_found(&self, kind: Resource) -> bool {
        matches!(self, StoreError::NotFound { resource, .. } if *resource == kind)
    }

    /// Envelope code for this error.
    pub fn code(&self) -> ResponseCode {
        match self {
            StoreError::InvalidInput { .. } => ResponseCode::ParamError,
            StoreError::Conflict { .. } => ResponseCode::Conflict,
            StoreError::NotFound { .. } => ResponseCode::QueryEmpty,
            StoreError::TooLarge { .. } => ResponseCode::ParamError,
            StoreError::InvalidName { .. } => ResponseCode::RequestDenied,
            StoreError::PathViolation { .. } => ResponseCode::RequestDenied,
            StoreError::Unauthorized { .. } => ResponseCode::TokenInvalid,
            StoreError::CryptoFailure(_)
            | StoreError::Corrupt { .. }
            | StoreError::Io(_)
            | StoreError::Internal(_) => ResponseCode::RequestFails,
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            StoreError::Conflict { .. } => StatusCode::CONFLICT,
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            StoreError::InvalidName { .. } => StatusCode::BAD_REQUEST,
            StoreError::PathViolation { .. } => StatusCode::FORBIDDEN,
            StoreError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            StoreError::CryptoFailure(_)
            | StoreError::Corrupt { .. }
            | StoreError::Io(_)
            | StoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        // Internal details stay in the log; the client gets a generic line.
        let detail = if status.is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        envelope::failure(status, self.code(), "operation failed", detail)
    }
}
