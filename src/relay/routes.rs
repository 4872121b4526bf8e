use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the relay router with all routes
pub fn create_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Request logging
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.cors_origins));

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Inference pass-through
        .route("/api/ser", post(handlers::relay_predict))
        .route("/predict", post(handlers::relay_predict))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(middleware)
        .with_state(state)
}
