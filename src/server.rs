//! Axum router construction and route mapping.
//!
//! The [`app`] function wires every endpoint to its handler and returns a
//! ready-to-serve [`axum::Router`].
//!
//! Routes fall into three groups:
//! - open: `/`, `/health`, `/metrics`, and `/storage/...` (which does its
//!   own policy-dependent key check)
//! - credential routes, open or key-protected depending on
//!   `auth.open_credential_routes`
//! - bucket and file routes, always key-protected

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{
        header::{CONTENT_TYPE, DATE, SERVER},
        HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::auth;
use crate::envelope::{self, ResponseCode};
use crate::errors::{generate_request_id, StoreError};
use crate::handlers::{bucket, credential, file, storage};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Build the axum [`Router`] with all routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let credential_routes = Router::new()
        .route("/access_key/create", post(credential::create))
        .route("/access_key/list", get(credential::list))
        .route("/access_key/info", get(credential::info))
        .route("/access_key/delete", delete(credential::delete));
    let credential_routes = if state.config.auth.open_credential_routes {
        credential_routes
    } else {
        credential_routes.route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_key,
        ))
    };

    let protected_routes = Router::new()
        .route("/bucket/create", post(bucket::create))
        .route("/bucket/list", get(bucket::list))
        .route("/bucket/info", get(bucket::info))
        .route("/bucket/delete", delete(bucket::delete))
        .route("/file/upload", post(file::upload))
        .route("/file/download", get(file::download))
        .route("/file/list", get(file::list))
        .route("/file/list-all", get(file::list_all))
        .route("/file/info", get(file::info))
        .route("/file/delete", delete(file::delete))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_key,
        ));

    let body_limit = usize::try_from(state.config.server.max_upload_size).unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/storage/:bucket/*path", get(storage::serve))
        .merge(credential_routes)
        .merge(protected_routes)
        .fallback(not_found)
        // Application state shared across all handlers.
        .with_state(state)
        // Layer ordering: inner layers run first, outer layers wrap them.
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        // metrics_middleware is outer (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
        // Outermost, so a panic anywhere below still becomes an envelope.
        .layer(CatchPanicLayer::custom(handle_panic))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(auth::ACCESS_KEY_HEADER),
            HeaderName::from_static(auth::SECRET_KEY_HEADER),
        ])
        .expose_headers([REQUEST_ID_HEADER])
}

// -- Common headers middleware -----------------------------------------------

/// Tower middleware that adds common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `stashbox`
async fn common_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key(&REQUEST_ID_HEADER) {
        if let Ok(value) = HeaderValue::from_str(&generate_request_id()) {
            headers.insert(REQUEST_ID_HEADER, value);
        }
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert(DATE, value);
    }
    headers.insert(SERVER, HeaderValue::from_static("stashbox"));

    response
}

// -- Auth middleware ---------------------------------------------------------

/// Access-key middleware for protected route groups.
///
/// Requires `X-Access-Key` and `X-Secret-Key` and checks them against the
/// credential store.  Returns `Unauthorized` when either is missing or the
/// pair does not verify.
async fn require_access_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StoreError> {
    let keys = auth::extract_keys(req.headers())?;

    if !state
        .credentials
        .verify(&keys.access_key, &keys.secret_key)
        .await
    {
        warn!(
            access_key = %keys.access_key,
            path = %req.uri().path(),
            "rejected access key pair"
        );
        return Err(StoreError::Unauthorized {
            message: "invalid access key or secret key".to_string(),
        });
    }

    debug!(access_key = %keys.access_key, "auth OK");
    Ok(next.run(req).await)
}

// -- Panic recovery ----------------------------------------------------------

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "request handler panicked");

    envelope::failure(
        StatusCode::INTERNAL_SERVER_ERROR,
        ResponseCode::RequestFails,
        "operation failed",
        "internal server error".to_string(),
    )
}

// -- Small routes ------------------------------------------------------------

/// `GET /`
async fn welcome() -> Response {
    envelope::done("welcome to stashbox")
}

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

async fn not_found() -> Response {
    envelope::failure(
        StatusCode::NOT_FOUND,
        ResponseCode::QueryEmpty,
        "operation failed",
        "no such route".to_string(),
    )
}

// -- Tests -------------------------------------------------------------------
