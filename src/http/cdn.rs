//! Object serving
//!
//! Every request that doesn't hit a service endpoint lands here. The path
//! is looked up in the route table, the object is fetched from storage,
//! and PNG/JPEG payloads are optionally resized or re-encoded according
//! to `?resize=` / `?format=`.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::sync::Arc;

use super::cache::SourceId;
use super::handlers::ApiError;
use crate::content_type;
use crate::route_table::RouteEntry;
use crate::state::AppState;
use crate::storage::sniff::OCTET_STREAM;
use crate::transform::{Transform, TransformRequest};

/// Serve a registered object
/// GET /{*path}
pub async fn serve_object(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let path = percent_decode_str(uri.path())
        .decode_utf8()
        .map_err(|_| ApiError::UnknownFile(uri.path().to_string()))?
        .into_owned();

    let entry = resolve_route(&state, &method, &path)?;
    let data = fetch(&state, &entry, &path).await?;

    let resolved = content_type::resolve(&entry.object.content_type, &data, state.storage.as_ref());
    let request = TransformRequest::from_query(&params);

    let (content_type, body) = match resolved.image_kind() {
        Some(kind) if !request.is_empty() => match request.plan(kind)? {
            Some(transform) => {
                let content_type = match transform {
                    // A resize keeps the stored type
                    Transform::Resize { .. } => resolved.header,
                    Transform::Reformat(format) => format.mime_type().to_string(),
                };
                let body = apply_transform(&state, &entry, data, transform).await?;
                (content_type, body)
            }
            None => (resolved.header, data),
        },
        _ => (resolved.header, data),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    if let Some(etag) = entry.object.etag.as_deref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(body)
    };

    Ok((StatusCode::OK, headers, body).into_response())
}

/// Find the route for a request
///
/// `HEAD` is served by the `GET` route. A path that is registered for some
/// other method answers 405; anything else is an unknown file.
fn resolve_route(state: &AppState, method: &Method, path: &str) -> Result<RouteEntry, ApiError> {
    let lookup = if method == Method::HEAD {
        &Method::GET
    } else {
        method
    };

    if let Some(entry) = state.routes.lookup(lookup, path) {
        return Ok(entry);
    }

    if state.routes.has_path(path) {
        Err(ApiError::UnknownRoute {
            method: method.clone(),
            path: path.to_string(),
        })
    } else {
        Err(ApiError::UnknownFile(path.to_string()))
    }
}

/// Read the whole object, bounded by the configured read timeout
async fn fetch(state: &AppState, entry: &RouteEntry, path: &str) -> Result<Bytes, ApiError> {
    let timeout = state.config.request.read_timeout();

    match tokio::time::timeout(timeout, state.storage.open(entry.storage_key())).await {
        Ok(Ok(Some(data))) => Ok(data),
        Ok(Ok(None)) => {
            tracing::debug!("Route {} points to missing object {}", path, entry.storage_key());
            Err(ApiError::MissingObject(path.to_string()))
        }
        Ok(Err(e)) => {
            tracing::warn!("Unable to open {}: {}", entry.storage_key(), e);
            Err(ApiError::from_storage(e, path))
        }
        Err(_) => Err(ApiError::Internal(format!(
            "Timed out after {:?} reading {}",
            timeout,
            entry.storage_key()
        ))),
    }
}

/// Run a transform on the blocking pool, going through the cache
async fn apply_transform(
    state: &AppState,
    entry: &RouteEntry,
    data: Bytes,
    transform: Transform,
) -> Result<Bytes, ApiError> {
    let source = SourceId {
        key: entry.storage_key(),
        len: data.len(),
        etag: entry.object.etag.as_deref(),
    };

    if let Some(cached) = state.transform_cache.get(source, transform) {
        tracing::debug!("Transform cache hit for {} ({})", entry.http_path, transform);
        return Ok(cached);
    }

    // Image decode/encode is CPU-bound; keep it off the async workers
    let output = tokio::task::spawn_blocking(move || transform.apply(&data))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    state.transform_cache.insert(source, transform, output.clone());
    Ok(output)
}
