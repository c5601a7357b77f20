use axum::extract::State;
use axum::Json;
use serde_json::json;
use vigil_common::types::DetectionEvent;

use super::error::AppResult;
use crate::state::AppState;

/// `POST /v1/events`: ingestion entry for the detection pipeline.
///
/// Evaluates the event against the loaded rule set and responds with the
/// per-rule dispatch outcomes. Rules whose dispatch failed at the storage
/// layer are reported in `errors` without failing the request; the event
/// itself was still evaluated.
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(mut event): Json<DetectionEvent>,
) -> AppResult<Json<serde_json::Value>> {
    if event.id.is_empty() {
        event.id = vigil_common::id::next_id();
    }

    let results = state.pipeline.evaluate_and_dispatch(&event).await;

    let mut outcomes = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Rule dispatch failed");
                errors.push(e.to_string());
            }
        }
    }

    Ok(Json(json!({
        "event_id": event.id,
        "matched": outcomes.len() + errors.len(),
        "outcomes": outcomes,
        "errors": errors,
    })))
}
