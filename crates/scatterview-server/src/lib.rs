//! HTTP surface of the scatter image viewer.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod error;
pub mod response;
pub mod state;

pub use config::ServerConfig;
pub use state::AppState;

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/initial-scans-fetching", get(api::initial_scans_fetching))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
