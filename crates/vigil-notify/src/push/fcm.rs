use crate::error::{NotifyError, Result};
use crate::PushProvider;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use vigil_common::types::{DeliveryStatus, NotificationPayload, Platform};

const DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com";

/// FCM provider configuration (HTTP v1 API).
#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    /// Firebase project ID, part of the send URL.
    pub project_id: String,
    /// OAuth2 access token for the service account.
    pub auth_token: String,
    /// Override for the FCM host (tests).
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Firebase Cloud Messaging delivery for Android devices.
pub struct FcmProvider {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    auth_token: String,
}

impl FcmProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: FcmConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotifyError::HttpError)?;
        Ok(Self {
            client,
            endpoint: config
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            project_id: config.project_id,
            auth_token: config.auth_token,
        })
    }

    fn render_body(token: &str, payload: &NotificationPayload) -> serde_json::Value {
        serde_json::json!({
            "message": {
                "token": token,
                "notification": {
                    "title": payload.title,
                    "body": payload.body,
                },
                "data": {
                    "event_id": payload.event_id,
                    "camera_id": payload.camera_id,
                    "thumbnail_url": payload.thumbnail_url.clone().unwrap_or_default(),
                },
                "android": {
                    "priority": if payload.critical { "HIGH" } else { "NORMAL" },
                },
            }
        })
    }
}

/// Error envelope returned by the FCM v1 API.
#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    error: Option<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorDetail {
    status: Option<String>,
}

fn map_status(status: u16, error_status: Option<&str>) -> DeliveryStatus {
    match status {
        200 => DeliveryStatus::Success,
        404 => DeliveryStatus::InvalidToken,
        400 if error_status == Some("INVALID_ARGUMENT") => DeliveryStatus::InvalidToken,
        401 | 403 => DeliveryStatus::AuthError,
        429 => DeliveryStatus::RateLimited,
        s if s >= 500 => DeliveryStatus::ServerError,
        _ => DeliveryStatus::Failed,
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn send(&self, token: &str, payload: &NotificationPayload) -> Result<DeliveryStatus> {
        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.project_id
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.auth_token)
            .json(&Self::render_body(token, payload))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let error_status = if status != 200 {
            resp.json::<FcmErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.status)
        } else {
            None
        };

        let mapped = map_status(status, error_status.as_deref());
        if mapped != DeliveryStatus::Success {
            tracing::warn!(
                status,
                error_status = error_status.as_deref().unwrap_or("-"),
                "FCM delivery not successful"
            );
        }
        Ok(mapped)
    }

    fn platform(&self) -> Platform {
        Platform::Android
    }

    fn name(&self) -> &str {
        "fcm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(map_status(200, None), DeliveryStatus::Success);
        assert_eq!(map_status(404, Some("UNREGISTERED")), DeliveryStatus::InvalidToken);
        assert_eq!(
            map_status(400, Some("INVALID_ARGUMENT")),
            DeliveryStatus::InvalidToken
        );
        assert_eq!(map_status(401, None), DeliveryStatus::AuthError);
        assert_eq!(map_status(429, None), DeliveryStatus::RateLimited);
        assert_eq!(map_status(500, None), DeliveryStatus::ServerError);
    }
}
