use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use vigil_storage::StorageError;

use super::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// `GET /v1/notifications?unread_only=&limit=`
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let limit = query.limit.min(500);
    let notifications = state.store.list_notifications(query.unread_only, limit)?;
    Ok(Json(json!({ "notifications": notifications })))
}

/// `POST /v1/notifications/{id}/read`
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    if !state.store.mark_notification_read(&id)? {
        return Err(AppError::Storage(StorageError::NotFound {
            entity: "notification",
            id,
        }));
    }
    Ok(Json(json!({ "id": id, "read": true })))
}
