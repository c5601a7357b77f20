//! Action execution for triggered rules.
//!
//! The dispatcher owns the trigger path for a single (event, rule) pair:
//! claim the cooldown, persist the bookkeeping, then run the rule's
//! configured actions. Action failures are recorded in the outcome but
//! never abort the other actions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use vigil_alert::cooldown::CooldownTracker;
use vigil_alert::AlertRule;
use vigil_common::id;
use vigil_common::types::{DeliveryResult, DeliveryStatus, DetectionEvent, NotificationPayload};
use vigil_notify::dispatch::{PushDevice, PushDispatchService};
use vigil_notify::quiet::QuietHours;
use vigil_notify::signed_url::SignedUrlService;
use vigil_notify::webhook::{WebhookClient, WebhookResult};
use vigil_storage::{AlertStore, DeviceRow, NotificationRow, WebhookLogRow};

/// Maximum stored length of a notification's event description.
const MAX_DESCRIPTION_LENGTH: usize = 200;

/// What happened when one matched rule was dispatched.
#[derive(Debug, serde::Serialize)]
pub struct DispatchOutcome {
    pub rule_id: String,
    pub rule_name: String,
    /// False when the cooldown window swallowed the trigger.
    pub triggered: bool,
    pub notification_id: Option<String>,
    /// Live dashboard connections that received the broadcast.
    pub broadcast_count: Option<usize>,
    pub webhook: Option<WebhookResult>,
    pub push: Vec<DeliveryResult>,
}

impl DispatchOutcome {
    fn suppressed(rule: &AlertRule) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            triggered: false,
            notification_id: None,
            broadcast_count: None,
            webhook: None,
            push: Vec::new(),
        }
    }
}

/// Executes the actions of rules that matched an event.
pub struct ActionDispatcher {
    store: Arc<dyn AlertStore>,
    cooldowns: Arc<CooldownTracker>,
    hub: Arc<crate::ws::BroadcastHub>,
    webhook: WebhookClient,
    push: PushDispatchService,
    signer: SignedUrlService,
    public_base_url: String,
    thumbnail_ttl_secs: u64,
}

impl ActionDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn AlertStore>,
        cooldowns: Arc<CooldownTracker>,
        hub: Arc<crate::ws::BroadcastHub>,
        webhook: WebhookClient,
        push: PushDispatchService,
        signer: SignedUrlService,
        public_base_url: String,
        thumbnail_ttl_secs: u64,
    ) -> Self {
        Self {
            store,
            cooldowns,
            hub,
            webhook,
            push,
            signer,
            public_base_url,
            thumbnail_ttl_secs,
        }
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    pub fn signer(&self) -> &SignedUrlService {
        &self.signer
    }

    /// Runs the full trigger path for one matched rule.
    ///
    /// The cooldown claim happens first; a suppressed trigger does nothing
    /// else. After a successful claim the bookkeeping is persisted before
    /// any action runs, so a crash mid-dispatch never re-arms the rule.
    ///
    /// # Errors
    ///
    /// Only storage failures on the bookkeeping write propagate; action
    /// failures are folded into the returned outcome.
    pub async fn dispatch_at(
        &self,
        event: &DetectionEvent,
        rule: &AlertRule,
        now: DateTime<Utc>,
    ) -> anyhow::Result<DispatchOutcome> {
        let Some(trigger_count) = self.cooldowns.try_claim(&rule.id, rule.cooldown, now) else {
            tracing::debug!(
                rule_id = %rule.id,
                rule_name = %rule.name,
                event_id = %event.id,
                "Trigger suppressed by cooldown"
            );
            return Ok(DispatchOutcome::suppressed(rule));
        };

        self.store
            .record_trigger(&rule.id, now, trigger_count as i64)?;
        tracing::info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            event_id = %event.id,
            trigger_count,
            "Alert rule triggered"
        );

        let mut outcome = DispatchOutcome {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            triggered: true,
            notification_id: None,
            broadcast_count: None,
            webhook: None,
            push: Vec::new(),
        };

        if rule.actions.dashboard_notification {
            let payload = self.build_payload(event, rule, now);

            match self.persist_notification(event, rule, &payload, now) {
                Ok(notification_id) => {
                    let count = self
                        .hub
                        .broadcast(serde_json::json!({
                            "type": "notification",
                            "notification_id": notification_id,
                            "payload": payload,
                        }))
                        .await;
                    outcome.notification_id = Some(notification_id);
                    outcome.broadcast_count = Some(count);
                }
                Err(e) => {
                    tracing::error!(
                        rule_id = %rule.id,
                        error = %e,
                        "Failed to persist dashboard notification"
                    );
                }
            }

            outcome.push = self.dispatch_push(&payload, now).await;
        }

        if let Some(action) = &rule.actions.webhook {
            let result = self
                .webhook
                .post(&action.url, &action.headers, &webhook_body(event, rule))
                .await;
            if let Err(e) = self.log_webhook(event, rule, action, &result, now) {
                tracing::error!(rule_id = %rule.id, error = %e, "Failed to record webhook log");
            }
            outcome.webhook = Some(result);
        }

        Ok(outcome)
    }

    fn build_payload(
        &self,
        event: &DetectionEvent,
        rule: &AlertRule,
        now: DateTime<Utc>,
    ) -> NotificationPayload {
        let thumbnail_url = Some(self.signer.generate_at(
            &event.id,
            &self.public_base_url,
            self.thumbnail_ttl_secs,
            now,
        ));
        NotificationPayload {
            event_id: event.id.clone(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            camera_id: event.camera_id.clone(),
            title: rule.name.clone(),
            body: vigil_common::types::truncate_str(&event.description, MAX_DESCRIPTION_LENGTH),
            thumbnail_url,
            critical: rule.actions.critical,
            timestamp: now,
        }
    }

    fn persist_notification(
        &self,
        event: &DetectionEvent,
        rule: &AlertRule,
        payload: &NotificationPayload,
        now: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        let row = NotificationRow {
            id: id::next_id(),
            event_id: event.id.clone(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            event_description: payload.body.clone(),
            thumbnail_url: payload.thumbnail_url.clone(),
            read: false,
            created_at: now,
        };
        self.store.insert_notification(&row)?;
        Ok(row.id)
    }

    async fn dispatch_push(
        &self,
        payload: &NotificationPayload,
        now: DateTime<Utc>,
    ) -> Vec<DeliveryResult> {
        let devices = match self.store.list_devices() {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load devices for push dispatch");
                return Vec::new();
            }
        };
        let devices: Vec<PushDevice> = devices.iter().filter_map(push_device).collect();
        if devices.is_empty() {
            return Vec::new();
        }

        let results = self.push.dispatch_at(payload, &devices, now).await;

        // Dead tokens are only reported; the device-registration CRUD
        // owns the record and decides when to drop it.
        let dead = results
            .iter()
            .filter(|r| r.status == DeliveryStatus::InvalidToken)
            .count();
        if dead > 0 {
            tracing::warn!(dead, "Devices with dead push tokens need cleanup");
        }

        results
    }

    fn log_webhook(
        &self,
        event: &DetectionEvent,
        rule: &AlertRule,
        action: &vigil_alert::WebhookAction,
        result: &WebhookResult,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.store.insert_webhook_log(&WebhookLogRow {
            id: id::next_id(),
            alert_rule_id: rule.id.clone(),
            event_id: event.id.clone(),
            url: action.url.clone(),
            status_code: result.status_code as i32,
            response_time_ms: result.response_time_ms as i64,
            retry_count: result.retry_count as i32,
            success: result.success,
            error_message: result.error_message.clone(),
            created_at: now,
        })?;
        Ok(())
    }
}

/// Builds the JSON body POSTed to a rule's webhook target.
fn webhook_body(event: &DetectionEvent, rule: &AlertRule) -> serde_json::Value {
    serde_json::json!({
        "event_id": event.id,
        "rule_id": rule.id,
        "rule_name": rule.name,
        "camera_id": event.camera_id,
        "timestamp": event.timestamp.to_rfc3339(),
        "description": event.description,
        "confidence": event.confidence,
        "objects_detected": event.objects_detected,
        "audio_event_type": event.audio_event_type,
        "entity_id": event.entity_id,
    })
}

/// Maps a persisted device row to its delivery view. Rows with an
/// unknown platform are skipped; malformed quiet-hours config degrades
/// to "no suppression" so a bad timezone never silences a device.
pub fn push_device(row: &DeviceRow) -> Option<PushDevice> {
    let platform = match row.platform.parse() {
        Ok(p) => p,
        Err(_) => {
            tracing::warn!(
                device_id = %row.device_id,
                platform = %row.platform,
                "Skipping device with unknown platform"
            );
            return None;
        }
    };

    let quiet_hours = if row.quiet_hours_enabled {
        match QuietHours::parse(
            &row.quiet_hours_start,
            &row.quiet_hours_end,
            &row.quiet_hours_timezone,
            row.override_critical,
        ) {
            Ok(q) => Some(q),
            Err(e) => {
                tracing::warn!(
                    device_id = %row.device_id,
                    error = %e,
                    "Ignoring malformed quiet hours config"
                );
                None
            }
        }
    } else {
        None
    };

    Some(PushDevice {
        device_id: row.device_id.clone(),
        platform,
        push_token: row.push_token.clone(),
        quiet_hours,
    })
}
