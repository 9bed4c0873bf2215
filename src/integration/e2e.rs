//! End-to-end tests
//!
//! Drive the full router: scan a backend, then request objects the way a
//! client would.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use image::{GenericImageView, ImageFormat};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use crate::config::ServerConfig;
use crate::http::create_router;
use crate::integration::fixtures::{logo_png, sample_png, scan, seeded_storage, LOGO_KEY};
use crate::refresh::RouteRefresher;
use crate::state::AppState;
use crate::storage::{FilesystemStorage, StoragePort};

async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn error_code(response: Response) -> String {
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["success"], false);
    json["errors"][0]["code"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_logo_scenario() {
    let storage = seeded_storage();
    let state = Arc::new(AppState::new(ServerConfig::default(), storage));
    let app = create_router(state.clone());

    // Nothing is routed before the first scan
    let response = get(&app, "/images/logo.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(scan(&state).await, 1);

    let response = get(&app, "/images/logo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = body_bytes(response).await;
    assert_eq!(body, logo_png());

    let response = get(&app, "/images/logo.png?resize=512").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let declared: usize = response.headers()[header::CONTENT_LENGTH]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let body = body_bytes(response).await;
    assert_eq!(declared, body.len());
    assert_eq!(image::guess_format(&body).unwrap(), ImageFormat::Png);
    assert_eq!(image::load_from_memory(&body).unwrap().dimensions(), (512, 512));

    let response = get(&app, "/images/logo.png?resize=300").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "INVALID_RESIZE_PARAMS");

    let response = get(&app, "/images/missing.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["errors"][0]["code"], "UNKNOWN_FILE");
    assert_eq!(
        json["errors"][0]["message"],
        "File '/images/missing.png' was not found."
    );
}

#[tokio::test]
async fn test_validation_boundaries() {
    let state = Arc::new(AppState::new(ServerConfig::default(), seeded_storage()));
    scan(&state).await;
    let app = create_router(state);

    for bad in ["255", "4096", "abc"] {
        let response = get(&app, &format!("/images/logo.png?resize={}", bad)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "resize={}", bad);
        assert_eq!(error_code(response).await, "INVALID_RESIZE_PARAMS");
    }

    let response = get(&app, "/images/logo.png?resize=256").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&app, "/images/logo.png?format=gif").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "INVALID_FORMAT");

    let response = get(&app, "/images/logo.png?format=jpg").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    let body = body_bytes(response).await;
    assert_eq!(image::guess_format(&body).unwrap(), ImageFormat::Jpeg);
    assert_eq!(image::load_from_memory(&body).unwrap().dimensions(), (52, 52));
}

#[tokio::test]
async fn test_new_objects_appear_after_refresh() {
    let storage = seeded_storage();
    let state = Arc::new(AppState::new(ServerConfig::default(), storage.clone()));
    let app = create_router(state.clone());
    let handle = RouteRefresher::new(state.clone(), Duration::from_millis(10)).spawn();

    storage.fail_next_lists(2);
    storage.insert("css/site.css", "body {}", "text/css");

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while state.routes.len() < 2 && std::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let response = get(&app, "/css/site.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    assert_eq!(state.refresh.failures(), 2);
    assert!(state.refresh.is_running());

    state.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(!state.refresh.is_running());
}

#[tokio::test]
async fn test_filesystem_backend() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("images")).unwrap();
    std::fs::write(dir.path().join("images/photo.png"), sample_png(30, 20)).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "plain text").unwrap();
    std::fs::write(dir.path().join(".hidden"), "secret").unwrap();

    let storage: Arc<dyn StoragePort> = Arc::new(FilesystemStorage::new(dir.path()).await.unwrap());
    let state = Arc::new(AppState::new(ServerConfig::default(), storage));
    assert_eq!(scan(&state).await, 2);
    let app = create_router(state);

    let response = get(&app, "/images/photo.png?resize=1024").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert_eq!(image::load_from_memory(&body).unwrap().dimensions(), (1024, 1024));

    let response = get(&app, "/notes.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, Bytes::from("plain text"));

    let response = get(&app, "/.hidden").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_service_endpoints() {
    let state = Arc::new(AppState::new(ServerConfig::default(), seeded_storage()));
    scan(&state).await;
    let app = create_router(state);

    let response = get(&app, "/heartbeat").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, Bytes::from("OK"));

    let response = get(&app, "/").await;
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["message"], "hello world!");

    let response = get(&app, "/info").await;
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["routes"], 1);
    assert_eq!(json["data"]["storage"], "memory");
    assert_eq!(json["data"]["refresh"]["cycles"], 1);
    assert_eq!(json["data"]["version"], env!("CARGO_PKG_VERSION"));

    let response = get(&app, "/list").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["data"]["images/logo.png"]["content_type"], "image/png");

    let request = Request::builder()
        .method("DELETE")
        .uri("/heartbeat")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error_code(response).await, "UNKNOWN_ROUTE");
}

#[tokio::test]
async fn test_logo_key_maps_to_path() {
    let storage = seeded_storage();
    let object = storage.list_all().await.unwrap().remove(0);
    assert_eq!(object.key, LOGO_KEY);
    assert_eq!(storage.http_path(&object).as_deref(), Some("/images/logo.png"));
}
