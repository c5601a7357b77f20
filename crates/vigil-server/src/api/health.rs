use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// `GET /v1/health`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "rules_loaded": state.pipeline.rule_count().await,
        "dashboard_connections": state.hub.connection_count().await,
    }))
}
