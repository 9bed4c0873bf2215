//! Axum router configuration

use axum::{
    http::{header, Method, Request},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::cdn::serve_object;
use super::handlers::{heartbeat, index, info, list, panic_handler, unknown_route};
use super::middleware::{default_headers, request_logger, DefaultHeaders, REQUEST_ID};

/// Create the Axum router with all routes
///
/// The service endpoints are fixed; every other path goes to the object
/// handler, which consults the route table.
pub fn create_router(state: Arc<AppState>) -> Router {
    let defaults = Arc::new(DefaultHeaders::from_config(&state.config));
    let cors_enabled = state.config.cors_enabled;

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        let request_id = request
            .headers()
            .get(&REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::debug_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    let mut router = Router::new()
        .route("/", get(index).fallback(unknown_route))
        .route("/heartbeat", get(heartbeat).fallback(unknown_route))
        .route("/info", get(info).fallback(unknown_route))
        .route("/list", get(list).fallback(unknown_route))
        .fallback(serve_object)
        // Middleware
        .layer(middleware::from_fn(request_logger))
        .layer(trace);

    if cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
            .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
            .max_age(Duration::from_secs(3600));
        router = router.layer(cors);
    }

    router
        .layer(CatchPanicLayer::custom(panic_handler))
        .layer(middleware::from_fn_with_state(defaults, default_headers))
        // State
        .with_state(state)
}
