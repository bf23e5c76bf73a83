//! HTTP API for alias registration.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::logging_middleware;
pub use types::*;

use crate::registrar::Registrar;
use axum::{
    http::{header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue},
    middleware as axum_middleware,
    routing::post,
    Router,
};
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Registration flow
    pub registrar: Arc<Registrar>,
}

impl AppState {
    /// Create new application state.
    pub fn new(registrar: Registrar) -> Self {
        Self {
            registrar: Arc::new(registrar),
        }
    }
}

/// Create the API router.
///
/// Every response, including 404s, allows any origin.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/register",
            post(handlers::register).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
