//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

pub use routes::create_router;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router: `/health` plus the `/api/v1` surface.
pub fn build_router(state: AppState) -> Router {
    // Layers run last-added first: logging -> actor -> handler
    let api_routes = create_router()
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::actor_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::logging_middleware));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
