//! Outbound delivery for the vigil alerting core.
//!
//! Three delivery surfaces live here: the webhook client (bounded retries,
//! one summarizing result per dispatch), the push fan-out service with
//! [`PushProvider`] implementations for APNS and FCM plus per-device
//! quiet-hours filtering, and the HMAC signed-URL service that lets push
//! payloads reference thumbnails without embedding media.

pub mod dispatch;
pub mod error;
pub mod push;
pub mod quiet;
pub mod signed_url;
pub mod webhook;


use crate::error::Result;
use async_trait::async_trait;
use vigil_common::types::{DeliveryStatus, NotificationPayload, Platform};

/// A push-notification provider for one device platform (APNS, FCM).
///
/// Implementations translate the provider's HTTP responses into
/// [`DeliveryStatus`] values; transport-level failures surface as errors
/// and are isolated per device by the dispatch service.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Delivers `payload` to the device identified by `token`.
    ///
    /// # Errors
    ///
    /// Returns an error only when no HTTP response was received (timeout,
    /// connection refused). A response, even a failure response, maps to a
    /// [`DeliveryStatus`].
    async fn send(&self, token: &str, payload: &NotificationPayload) -> Result<DeliveryStatus>;

    /// The platform this provider serves.
    fn platform(&self) -> Platform;

    /// Provider name for logging (e.g., `"apns"`).
    fn name(&self) -> &str;
}
