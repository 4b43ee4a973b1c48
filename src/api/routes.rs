use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower::ServiceBuilder;
use axum::extract::DefaultBodyLimit;

use super::handlers::*;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn create_router() -> Router {
    Router::new()
        .route("/api/resolve", get(resolve_descriptor))
        .route("/api/convert", post(convert_upload))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
                .layer(CorsLayer::permissive())
        )
}
