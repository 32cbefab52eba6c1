//! Router for the template API served behind the dev server's `/api` proxy.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

pub fn api_router(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/api/templates",
            get(handlers::list_templates).post(handlers::create_template),
        )
        .route("/api/templates/process", post(handlers::process))
        .route("/api/templates/:id", get(handlers::get_template))
        .route(
            "/api/templates/:id/versions",
            get(handlers::list_versions).post(handlers::create_version),
        )
        .layer(TraceLayer::new_for_http()) // Log requests/responses
        .layer(CorsLayer::permissive()) // Allow all origins
        .with_state(app_state)
}
