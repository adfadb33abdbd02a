//! JSON response envelope.
//!
//! Every API response (except raw blob downloads) is wrapped as
//! `{"code", "success", "data", "message", "errors"}` so clients can
//! branch on `success` without inspecting the HTTP status.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Application-level result codes carried in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    ParamError,
    RequestSuccess,
    RequestDenied,
    QueryEmpty,
    TokenInvalid,
    Conflict,
    RequestFails,
}

impl ResponseCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCode::ParamError => "10001",
            ResponseCode::RequestSuccess => "20000",
            ResponseCode::RequestDenied => "40001",
            ResponseCode::QueryEmpty => "40004",
            ResponseCode::TokenInvalid => "40005",
            ResponseCode::Conflict => "40009",
            ResponseCode::RequestFails => "50000",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: &'static str,
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
    pub errors: Vec<String>,
}

fn render<T: Serialize>(status: StatusCode, envelope: &Envelope<T>) -> Response {
    match serde_json::to_vec(envelope) {
        Ok(body) => (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize response envelope");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// 200 OK with `data` wrapped in a success envelope.
pub fn success<T: Serialize>(message: &str, data: T) -> Response {
    render(
        StatusCode::OK,
        &Envelope {
            code: ResponseCode::RequestSuccess.as_str(),
            success: true,
            data: Some(data),
            message: message.to_string(),
            errors: Vec::new(),
        },
    )
}

/// 200 OK with a null `data` field.
pub fn done(message: &str) -> Response {
    render(
        StatusCode::OK,
        &Envelope::<()> {
            code: ResponseCode::RequestSuccess.as_str(),
            success: true,
            data: None,
            message: message.to_string(),
            errors: Vec::new(),
        },
    )
}

pub fn failure(status: StatusCode, code: ResponseCode, message: &str, detail: String) -> Response {
    render(
        status,
        &Envelope::<()> {
            code: code.as_str(),
            success: false,
            data: None,
            message: message.to_string(),
            errors: vec![detail],
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let env = Envelope {
            code: ResponseCode::RequestSuccess.as_str(),
            success: true,
            data: Some(vec!["a"]),
            message: "ok".to_string(),
            errors: Vec::new(),
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["code"], "20000");
        assert_eq!(json["success"], true);
        assert_eq!(json["data"][0], "a");
        assert_eq!(json["errors"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_failure_status() {
        let resp = failure(
            StatusCode::NOT_FOUND,
            ResponseCode::QueryEmpty,
            "operation failed",
            "missing".to_string(),
        );
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
