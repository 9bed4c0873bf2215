//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the service endpoints and the object fallback
//! - Object serving with optional image transforms
//! - In-memory cache of transformed images
//! - Default response headers and request logging
//! - CORS middleware and panic recovery

pub mod cache;
pub mod cdn;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::create_router;
