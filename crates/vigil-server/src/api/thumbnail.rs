use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::path::PathBuf;

use super::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignatureQuery {
    pub expires: i64,
    pub sig: String,
}

/// `GET /v1/events/{id}/thumbnail?expires=&sig=`
///
/// Gated by the HMAC signature; a missing, expired, or invalid signature
/// is a 403 with no detail about which check failed.
pub async fn event_thumbnail(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Query(query): Query<SignatureQuery>,
) -> AppResult<Response> {
    let signer = state.pipeline.dispatcher().signer();
    if !signer.verify(&event_id, query.expires, &query.sig) {
        tracing::debug!(event_id = %event_id, "Rejected thumbnail request");
        return Err(AppError::Forbidden);
    }

    // Event IDs are snowflakes; anything else cannot name a stored file.
    if !event_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(AppError::BadRequest("invalid event id".to_string()));
    }

    let path: PathBuf = [
        state.config.data_dir.as_str(),
        "thumbnails",
        &format!("{event_id}.jpg"),
    ]
    .iter()
    .collect();

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(StatusCode::NOT_FOUND.into_response())
        }
        Err(e) => Err(AppError::Internal(anyhow::anyhow!(
            "Failed to read thumbnail {}: {e}",
            path.display()
        ))),
    }
}
