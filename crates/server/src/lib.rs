#![forbid(unsafe_code)]
//! REST API for the guard training service.

use std::path::PathBuf;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use services::AppServices;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod extract;
mod routes;

pub use error::ApiError;

/// Router-level settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Directory served under `objects_path` when uploads are kept locally.
    pub objects_dir: Option<PathBuf>,
    /// Mount point for `objects_dir`; must match the store's public base.
    pub objects_path: String,
    /// Request body cap for uploads and imports.
    pub body_limit: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            objects_dir: None,
            objects_path: "/objects".to_owned(),
            body_limit: 100 * 1024 * 1024,
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
}

impl AppState {
    #[must_use]
    pub fn new(services: AppServices) -> Self {
        Self { services }
    }
}

/// Builds the full router.
pub fn build_router(state: AppState, config: &RouterConfig) -> Router {
    let mut router = Router::new()
        .merge(routes::health::routes())
        .merge(routes::auth::routes())
        .merge(routes::sites::routes())
        .merge(routes::guards::routes())
        .merge(routes::materials::routes())
        .merge(routes::records::routes())
        .merge(routes::notifications::routes())
        .merge(routes::uploads::routes())
        .with_state(state);

    if let Some(dir) = &config.objects_dir {
        router = router.nest_service(&config.objects_path, ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(TraceLayer::new_for_http())
}
