use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};

use crate::coordinator::Coordinator;

pub mod handlers;

/// Shared state for API handlers.
pub struct AppState {
    pub coordinator: Coordinator,
}

/// Build the adapter API router.
/// All routes are relative: the caller mounts this under `/api/v1`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/devices",
            get(handlers::list_devices).post(handlers::add_device),
        )
        .route("/devices/:id", get(handlers::get_device))
        .route(
            "/devices/:id/statistics",
            get(handlers::get_device_statistics),
        )
        .route("/owners/:id/devices", get(handlers::list_owner_devices))
        .route("/owners/:id/link", post(handlers::link_device))
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
