//! HTTP application wiring.
//!
//! This module is intentionally split into submodules:
//! - `routes/`: handlers grouped by concern
//! - `errors.rs`: consistent failure envelopes

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;
use crate::sheet::SheetStore;

pub mod errors;
pub mod routes;

/// Largest accepted request body. Base64 inflates a 5 MiB image to ~6.7 MiB.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub sheet: Arc<SheetStore>,
    pub public_url: Option<Arc<str>>,
}

/// Build the full HTTP router over a fresh sheet (public entrypoint used by `main.rs`).
pub fn build_app(config: &ApiConfig) -> Router {
    build_app_with(Arc::new(SheetStore::new()), config)
}

/// Build the router over an existing sheet.
pub fn build_app_with(sheet: Arc<SheetStore>, config: &ApiConfig) -> Router {
    let state = AppState {
        sheet,
        public_url: config.public_url.as_deref().map(Arc::from),
    };
    let auth_state = middleware::AuthState {
        token: config.token.as_deref().map(Arc::from),
    };

    // Token-protected: the backend contract endpoint.
    let protected = Router::new()
        .route(
            "/api/submit",
            get(routes::submit::query).post(routes::submit::post),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/files/:id", get(routes::files::download))
        .merge(protected)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(MAX_BODY_BYTES)))
}
