//! Species Filter API Server
//!
//! REST API for managing species filters and applying them to observations.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::{ConfigError, ServerConfig, StorageKind};
pub use error::ApiError;
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Filters
        .route("/api/filters", post(handlers::create_filter).get(handlers::list_filters))
        .route(
            "/api/filters/:id",
            get(handlers::get_filter)
                .put(handlers::update_filter)
                .delete(handlers::delete_filter),
        )
        // Application
        .route("/api/filters/apply", post(handlers::apply_enabled_filters))
        .route("/api/filters/:id/apply", post(handlers::apply_filter))
        // Observations
        .route("/api/observations/:id", get(handlers::get_observation))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
