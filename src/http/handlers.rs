//! HTTP request handlers
//!
//! The service endpoints (`/`, `/heartbeat`, `/info`, `/list`) and the
//! JSON error type every handler returns.

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{StorageError, TransformError};
use crate::state::AppState;
use crate::storage::{sniff::OCTET_STREAM, ContentTypeHint};

/// HTTP error type
///
/// Rendered as `{"success": false, "errors": [{"code", "message"}]}`.
#[derive(Debug)]
pub enum ApiError {
    /// No route was ever registered for the path
    UnknownFile(String),
    /// The route exists but the backend no longer has the object
    MissingObject(String),
    /// The path exists but not for this method
    UnknownRoute { method: Method, path: String },
    InvalidResize(String),
    InvalidFormat(String),
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownFile(_) | ApiError::MissingObject(_) => StatusCode::NOT_FOUND,
            ApiError::UnknownRoute { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InvalidResize(_) | ApiError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::UnknownFile(_) | ApiError::MissingObject(_) => "UNKNOWN_FILE",
            ApiError::UnknownRoute { .. } => "UNKNOWN_ROUTE",
            ApiError::InvalidResize(_) => "INVALID_RESIZE_PARAMS",
            ApiError::InvalidFormat(_) => "INVALID_FORMAT",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::UnknownFile(path) => format!("File '{}' was not found.", path),
            ApiError::MissingObject(path) => {
                format!("Cannot retrieve input stream for {}.", path)
            }
            ApiError::UnknownRoute { method, path } => {
                format!("Route {} {} was not found.", method, path)
            }
            ApiError::InvalidResize(msg) | ApiError::InvalidFormat(msg) => msg.clone(),
            ApiError::Internal(_) => "Unknown exception has occurred".to_string(),
        }
    }

    /// Map a backend failure while fetching `path`
    ///
    /// Anything that means "absent" is a 404. Transient failures are a 500.
    pub fn from_storage(err: StorageError, path: &str) -> Self {
        match err {
            StorageError::Unavailable(msg) => ApiError::Internal(msg),
            StorageError::InvalidKey(_) => ApiError::UnknownFile(path.to_string()),
            err => {
                if !err.is_not_found() {
                    tracing::debug!("Treating read failure on {} as missing: {}", path, err);
                }
                ApiError::MissingObject(path.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!("Request failed: {}", detail);
        }

        let body = ErrorBody {
            success: false,
            errors: vec![ErrorDetail {
                code: self.code(),
                message: self.message(),
            }],
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Turn a handler panic into the regular JSON 500
pub fn panic_handler(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::Internal(format!("route panicked: {}", details)).into_response()
}

impl From<TransformError> for ApiError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::InvalidResize(_) => ApiError::InvalidResize(err.to_string()),
            TransformError::InvalidFormat(_) => ApiError::InvalidFormat(err.to_string()),
            TransformError::Decode(_) | TransformError::Encode(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

/// Index endpoint
/// GET /
pub async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "hello world!",
    }))
}

/// Health check endpoint
/// GET /heartbeat
pub async fn heartbeat() -> &'static str {
    "OK"
}

/// Server information endpoint
/// GET /info
pub async fn info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "data": {
            "version": env!("CARGO_PKG_VERSION"),
            "routes": state.routes.len(),
            "storage": state.storage.name(),
            "uptime_secs": state.uptime_secs(),
            "refresh": state.refresh.summary(),
            "cache": state.transform_cache.stats(),
        }
    }))
}

#[derive(Debug, Serialize)]
struct ListedFile {
    endpoint: String,
    name: String,
    content_type: String,
    will_prompt_download: bool,
    size: u64,
    created_at: Option<String>,
}

/// Every served object, keyed by name
/// GET /list
pub async fn list(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let started = Instant::now();
    let snapshot = state.routes.snapshot();
    let base_url = format!("http://{}", state.config.socket_addr());

    let mut data = serde_json::Map::new();
    for entry in snapshot.values() {
        let object = &entry.object;
        let content_type = match &object.content_type {
            ContentTypeHint::Known(raw) => raw.clone(),
            ContentTypeHint::Unresolved => OCTET_STREAM.to_string(),
        };
        let name = entry.http_path.trim_start_matches('/').to_string();
        let file = ListedFile {
            endpoint: format!("{}{}", base_url, entry.http_path),
            will_prompt_download: content_type.starts_with(OCTET_STREAM),
            content_type,
            size: object.size,
            created_at: object.created_at.map(|t| t.to_rfc3339()),
            name: name.clone(),
        };
        data.insert(name, serde_json::json!(file));
    }
    data.insert(
        "took".to_string(),
        serde_json::json!(started.elapsed().as_millis() as u64),
    );

    Json(serde_json::json!({
        "success": true,
        "data": data,
    }))
}

/// Method fallback for the service endpoints
pub async fn unknown_route(method: Method, uri: Uri) -> ApiError {
    ApiError::UnknownRoute {
        method,
        path: uri.path().to_string(),
    }
}
