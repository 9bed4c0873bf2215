//! HTTP middleware
//!
//! Request logging and the headers every response carries.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;

pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");
const XSS_PROTECTION: HeaderName = HeaderName::from_static("x-xss-protection");
const CACHE_CONTROL_DEFAULT: &str = "public, max-age=7776000";

/// Request logging middleware
///
/// Health checks are not logged.
pub async fn request_logger(request: Request<Body>, next: Next) -> Response {
    if request.uri().path() == "/heartbeat" {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get(&REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_success() {
        info!("{} {} {} in {:?} [{}]", method, uri, status, duration, request_id);
    } else {
        warn!("{} {} {} in {:?} [{}]", method, uri, status, duration, request_id);
    }

    response
}

/// Headers added to every response
#[derive(Debug, Clone)]
pub struct DefaultHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl DefaultHeaders {
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut headers = vec![(
            POWERED_BY,
            HeaderValue::from_static(concat!("cdn-server/", env!("CARGO_PKG_VERSION"))),
        )];

        if config.security_headers {
            headers.push((header::X_FRAME_OPTIONS, HeaderValue::from_static("deny")));
            headers.push((
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ));
            headers.push((XSS_PROTECTION, HeaderValue::from_static("1; mode=block")));
        }

        for (name, value) in &config.extra_headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => headers.push((name, value)),
                _ => warn!("Ignoring invalid extra header {}: {}", name, value),
            }
        }

        Self { headers }
    }
}

/// Tag the request with an id and decorate the response
pub async fn default_headers(
    State(defaults): State<Arc<DefaultHeaders>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID)
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::try_from(Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("-"))
        });
    request.headers_mut().insert(REQUEST_ID, request_id.clone());

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    for (name, value) in &defaults.headers {
        headers.append(name.clone(), value.clone());
    }
    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_DEFAULT),
        );
    }
    headers.insert(REQUEST_ID, request_id);

    response
}
