use crate::quiet::QuietHours;
use crate::PushProvider;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use vigil_common::types::{DeliveryResult, DeliveryStatus, NotificationPayload, Platform};

/// The delivery-relevant view of a registered device, assembled by the
/// caller from the persisted device record. Malformed quiet-hours config
/// resolves to `None` (no suppression) at assembly time.
#[derive(Debug, Clone)]
pub struct PushDevice {
    pub device_id: String,
    pub platform: Platform,
    pub push_token: String,
    pub quiet_hours: Option<QuietHours>,
}

/// Fans a notification out to all of a user's devices, concurrently.
///
/// One instance per process, registered providers keyed by platform.
/// Per-device failures are isolated: every device produces exactly one
/// [`DeliveryResult`] regardless of what happens to the others.
pub struct PushDispatchService {
    providers: HashMap<Platform, Box<dyn PushProvider>>,
}

impl PushDispatchService {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registers a provider for its platform, replacing any previous one.
    pub fn register(&mut self, provider: Box<dyn PushProvider>) {
        self.providers.insert(provider.platform(), provider);
    }

    pub fn has_provider(&self, platform: Platform) -> bool {
        self.providers.contains_key(&platform)
    }

    /// Dispatches `payload` to every device, evaluated at the current time.
    pub async fn dispatch(
        &self,
        payload: &NotificationPayload,
        devices: &[PushDevice],
    ) -> Vec<DeliveryResult> {
        self.dispatch_at(payload, devices, Utc::now()).await
    }

    /// Dispatch with an injected clock for quiet-hours evaluation.
    ///
    /// All device deliveries are started together; none awaits another.
    pub async fn dispatch_at(
        &self,
        payload: &NotificationPayload,
        devices: &[PushDevice],
        now: DateTime<Utc>,
    ) -> Vec<DeliveryResult> {
        join_all(
            devices
                .iter()
                .map(|device| self.deliver_one(payload, device, now)),
        )
        .await
    }

    async fn deliver_one(
        &self,
        payload: &NotificationPayload,
        device: &PushDevice,
        now: DateTime<Utc>,
    ) -> DeliveryResult {
        if let Some(quiet) = &device.quiet_hours {
            if quiet.suppresses(payload.critical, now) {
                tracing::debug!(
                    device_id = %device.device_id,
                    "Push suppressed (quiet hours active)"
                );
                return DeliveryResult {
                    device_id: device.device_id.clone(),
                    platform: device.platform,
                    status: DeliveryStatus::Suppressed,
                    error: None,
                };
            }
        }

        let Some(provider) = self.providers.get(&device.platform) else {
            return DeliveryResult {
                device_id: device.device_id.clone(),
                platform: device.platform,
                status: DeliveryStatus::Failed,
                error: Some(format!("no push provider for platform {}", device.platform)),
            };
        };

        match provider.send(&device.push_token, payload).await {
            Ok(status) => {
                if status.is_permanent_failure() {
                    tracing::info!(
                        device_id = %device.device_id,
                        provider = provider.name(),
                        "Push token reported invalid; flagging for cleanup"
                    );
                }
                DeliveryResult {
                    device_id: device.device_id.clone(),
                    platform: device.platform,
                    status,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(
                    device_id = %device.device_id,
                    provider = provider.name(),
                    error = %e,
                    "Push delivery failed"
                );
                DeliveryResult {
                    device_id: device.device_id.clone(),
                    platform: device.platform,
                    status: DeliveryStatus::Failed,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

impl Default for PushDispatchService {
    fn default() -> Self {
        Self::new()
    }
}
