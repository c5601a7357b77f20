use crate::error::{NotifyError, Result};
use crate::PushProvider;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use vigil_common::types::{DeliveryStatus, NotificationPayload, Platform};

const DEFAULT_ENDPOINT: &str = "https://api.push.apple.com";

/// APNS provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApnsConfig {
    /// App bundle ID, sent as `apns-topic`.
    pub topic: String,
    /// Pre-provisioned provider token (JWT), sent as a bearer token.
    pub auth_token: String,
    /// Override for the APNS host (sandbox, tests).
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Apple Push Notification service delivery over the HTTP/2 provider API.
pub struct ApnsProvider {
    client: reqwest::Client,
    endpoint: String,
    topic: String,
    auth_token: String,
}

impl ApnsProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ApnsConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotifyError::HttpError)?;
        Ok(Self {
            client,
            endpoint: config
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            topic: config.topic,
            auth_token: config.auth_token,
        })
    }

    fn render_body(payload: &NotificationPayload) -> serde_json::Value {
        let sound = if payload.critical {
            serde_json::json!({ "critical": 1, "name": "default", "volume": 1.0 })
        } else {
            serde_json::json!("default")
        };
        serde_json::json!({
            "aps": {
                "alert": { "title": payload.title, "body": payload.body },
                "sound": sound,
                "mutable-content": 1,
            },
            "event_id": payload.event_id,
            "camera_id": payload.camera_id,
            "thumbnail_url": payload.thumbnail_url,
        })
    }
}

/// Error payload returned by APNS on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApnsErrorBody {
    reason: Option<String>,
}

fn map_status(status: u16, reason: Option<&str>) -> DeliveryStatus {
    match status {
        200 => DeliveryStatus::Success,
        410 => DeliveryStatus::InvalidToken,
        400 => match reason {
            Some("BadDeviceToken" | "Unregistered" | "DeviceTokenNotForTopic") => {
                DeliveryStatus::InvalidToken
            }
            _ => DeliveryStatus::Failed,
        },
        401 | 403 => DeliveryStatus::AuthError,
        429 => DeliveryStatus::RateLimited,
        s if s >= 500 => DeliveryStatus::ServerError,
        _ => DeliveryStatus::Failed,
    }
}

#[async_trait]
impl PushProvider for ApnsProvider {
    async fn send(&self, token: &str, payload: &NotificationPayload) -> Result<DeliveryStatus> {
        let url = format!("{}/3/device/{token}", self.endpoint);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.auth_token)
            .header("apns-topic", &self.topic)
            .header("apns-push-type", "alert")
            .header("apns-priority", "10")
            .json(&Self::render_body(payload))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let reason = if status != 200 {
            resp.json::<ApnsErrorBody>().await.ok().and_then(|b| b.reason)
        } else {
            None
        };

        let mapped = map_status(status, reason.as_deref());
        if mapped != DeliveryStatus::Success {
            tracing::warn!(
                status,
                reason = reason.as_deref().unwrap_or("-"),
                "APNS delivery not successful"
            );
        }
        Ok(mapped)
    }

    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn name(&self) -> &str {
        "apns"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(map_status(200, None), DeliveryStatus::Success);
        assert_eq!(map_status(410, None), DeliveryStatus::InvalidToken);
        assert_eq!(
            map_status(400, Some("BadDeviceToken")),
            DeliveryStatus::InvalidToken
        );
        assert_eq!(map_status(400, Some("PayloadTooLarge")), DeliveryStatus::Failed);
        assert_eq!(map_status(403, None), DeliveryStatus::AuthError);
        assert_eq!(map_status(429, None), DeliveryStatus::RateLimited);
        assert_eq!(map_status(503, None), DeliveryStatus::ServerError);
    }
}
