//! Route definitions and router construction.

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::get;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::handlers;
use crate::state::AppState;

/// Methods and headers are unrestricted; only the origin is configurable.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = match config {
        CorsConfig::AllowAll => AllowOrigin::any(),
        CorsConfig::AllowOrigins(origins) => AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok()),
        ),
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// API routes without the `/api` prefix.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::speech::health))
        .route("/speech/status", get(handlers::speech::status))
        .route("/speech/ws", get(handlers::speech_ws::speech_ws))
}

/// Create the main application router.
pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors))
        .with_state(state)
}
