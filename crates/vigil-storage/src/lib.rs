//! Persistence seam for the vigil alerting core.
//!
//! The core depends on storage only through [`AlertStore`], which names
//! exactly the operations the pipeline needs: read the rule set, persist
//! trigger bookkeeping, append audit/notification rows, and read device
//! registrations. [`sqlite::SqliteStore`] is the bundled implementation.

pub mod error;
pub mod sqlite;


pub use error::{Result, StorageError};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted alert rule. `conditions_json` and `actions_json` are the
/// user-edited predicate/action blobs, parsed by `vigil-alert` at load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleRow {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub conditions_json: String,
    pub actions_json: String,
    pub cooldown_minutes: i64,
    /// Updated only when a trigger is accepted (cooldown elapsed).
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// Monotonic; never decreases.
    pub trigger_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit record: one row per webhook dispatch attempt
/// sequence, summarizing all retries. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookLogRow {
    pub id: String,
    pub alert_rule_id: String,
    pub event_id: String,
    pub url: String,
    /// Final attempt's HTTP status; 0 = no response received.
    pub status_code: i32,
    pub response_time_ms: i64,
    pub retry_count: i32,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Dashboard notification record created when a rule fires with the
/// dashboard action enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRow {
    pub id: String,
    pub event_id: String,
    pub rule_id: String,
    /// Denormalized so the dashboard survives rule renames/deletes.
    pub rule_name: String,
    /// Truncated to 200 chars at creation.
    pub event_description: String,
    pub thumbnail_url: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A registered mobile/web device with its push preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRow {
    pub id: String,
    pub user_id: String,
    /// Client-supplied stable identifier; unique across registrations.
    pub device_id: String,
    /// "ios" | "android" | "web".
    pub platform: String,
    pub push_token: String,
    pub quiet_hours_enabled: bool,
    /// "HH:MM" local to `quiet_hours_timezone`.
    pub quiet_hours_start: String,
    pub quiet_hours_end: String,
    /// IANA zone name (e.g., "America/New_York").
    pub quiet_hours_timezone: String,
    pub override_critical: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The storage operations the alerting core depends on.
pub trait AlertStore: Send + Sync {
    fn list_rules(&self) -> Result<Vec<AlertRuleRow>>;
    fn get_rule(&self, id: &str) -> Result<AlertRuleRow>;
    fn upsert_rule(&self, row: &AlertRuleRow) -> Result<()>;
    fn delete_rule(&self, id: &str) -> Result<bool>;

    /// Persists trigger bookkeeping after an accepted cooldown claim.
    fn record_trigger(&self, rule_id: &str, at: DateTime<Utc>, trigger_count: i64) -> Result<()>;

    fn insert_webhook_log(&self, row: &WebhookLogRow) -> Result<()>;
    fn list_webhook_logs(&self, rule_id: Option<&str>, limit: u32) -> Result<Vec<WebhookLogRow>>;

    fn insert_notification(&self, row: &NotificationRow) -> Result<()>;
    fn list_notifications(&self, unread_only: bool, limit: u32) -> Result<Vec<NotificationRow>>;
    fn mark_notification_read(&self, id: &str) -> Result<bool>;

    fn upsert_device(&self, row: &DeviceRow) -> Result<()>;
    fn list_user_devices(&self, user_id: &str) -> Result<Vec<DeviceRow>>;
    fn list_devices(&self) -> Result<Vec<DeviceRow>>;
    fn delete_device(&self, device_id: &str) -> Result<bool>;
}
