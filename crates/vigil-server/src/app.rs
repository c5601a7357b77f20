use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api;
use crate::state::AppState;
use crate::ws::ws_handler;

/// Builds the HTTP router over the shared state.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/v1/health", get(api::health::health))
        .route("/v1/events", post(api::events::ingest_event))
        .route("/v1/events/{id}/thumbnail", get(api::thumbnail::event_thumbnail))
        .route("/v1/ws", get(ws_handler))
        .route("/v1/notifications", get(api::notifications::list_notifications))
        .route("/v1/notifications/{id}/read", post(api::notifications::mark_read))
        .layer(axum::middleware::from_fn(crate::logging::request_logging))
        .layer(cors)
        .with_state(state)
}

/// Empty origin list allows all (development mode); otherwise only the
/// configured origins, skipping any that fail to parse.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any)
}
