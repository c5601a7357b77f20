use crate::error::{Result, StorageError};
use crate::{AlertRuleRow, AlertStore, DeviceRow, NotificationRow, WebhookLogRow};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS alert_rules (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL DEFAULT 1,
    conditions_json TEXT NOT NULL,
    actions_json TEXT NOT NULL,
    cooldown_minutes INTEGER NOT NULL DEFAULT 0,
    last_triggered_at TEXT,
    trigger_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS webhook_logs (
    id TEXT PRIMARY KEY,
    alert_rule_id TEXT NOT NULL,
    event_id TEXT NOT NULL,
    url TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    response_time_ms INTEGER NOT NULL,
    retry_count INTEGER NOT NULL,
    success INTEGER NOT NULL,
    error_message TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (alert_rule_id) REFERENCES alert_rules(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_webhook_logs_rule ON webhook_logs(alert_rule_id);

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    event_id TEXT NOT NULL,
    rule_id TEXT NOT NULL,
    rule_name TEXT NOT NULL,
    event_description TEXT NOT NULL,
    thumbnail_url TEXT,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_created ON notifications(created_at);

CREATE TABLE IF NOT EXISTS devices (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    device_id TEXT NOT NULL UNIQUE,
    platform TEXT NOT NULL,
    push_token TEXT NOT NULL,
    quiet_hours_enabled INTEGER NOT NULL DEFAULT 0,
    quiet_hours_start TEXT NOT NULL DEFAULT '22:00',
    quiet_hours_end TEXT NOT NULL DEFAULT '07:00',
    quiet_hours_timezone TEXT NOT NULL DEFAULT 'UTC',
    override_critical INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_devices_user ON devices(user_id);
";

/// SQLite-backed [`AlertStore`]. A single connection behind a mutex is
/// plenty here: every statement is short and the hot path writes one
/// bookkeeping row per accepted trigger.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::Other("storage mutex poisoned".to_string()))?;
        f(&conn)
    }
}

fn to_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_ts(column: &'static str, value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp { column, value })
}

fn parse_opt_ts(column: &'static str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_ts(column, v)).transpose()
}

const RULE_COLS: &str =
    "id, name, enabled, conditions_json, actions_json, cooldown_minutes, last_triggered_at, \
     trigger_count, created_at, updated_at";

fn read_rule(row: &Row<'_>) -> Result<AlertRuleRow> {
    let last: Option<String> = row.get(6)?;
    let created: String = row.get(8)?;
    let updated: String = row.get(9)?;
    Ok(AlertRuleRow {
        id: row.get(0)?,
        name: row.get(1)?,
        enabled: row.get(2)?,
        conditions_json: row.get(3)?,
        actions_json: row.get(4)?,
        cooldown_minutes: row.get(5)?,
        last_triggered_at: parse_opt_ts("last_triggered_at", last)?,
        trigger_count: row.get(7)?,
        created_at: parse_ts("created_at", created)?,
        updated_at: parse_ts("updated_at", updated)?,
    })
}

impl AlertStore for SqliteStore {
    fn list_rules(&self) -> Result<Vec<AlertRuleRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {RULE_COLS} FROM alert_rules ORDER BY created_at"
            ))?;
            let mut rows = stmt.query([])?;
            let mut rules = Vec::new();
            while let Some(row) = rows.next()? {
                rules.push(read_rule(row)?);
            }
            Ok(rules)
        })
    }

    fn get_rule(&self, id: &str) -> Result<AlertRuleRow> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {RULE_COLS} FROM alert_rules WHERE id = ?1"
            ))?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => read_rule(row),
                None => Err(StorageError::NotFound {
                    entity: "alert_rule",
                    id: id.to_string(),
                }),
            }
        })
    }

    fn upsert_rule(&self, row: &AlertRuleRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO alert_rules \
                 (id, name, enabled, conditions_json, actions_json, cooldown_minutes, \
                  last_triggered_at, trigger_count, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT(id) DO UPDATE SET \
                  name = ?2, enabled = ?3, conditions_json = ?4, actions_json = ?5, \
                  cooldown_minutes = ?6, updated_at = ?10",
            )?
            .execute(params![
                row.id,
                row.name,
                row.enabled,
                row.conditions_json,
                row.actions_json,
                row.cooldown_minutes,
                row.last_triggered_at.map(to_ts),
                row.trigger_count,
                to_ts(row.created_at),
                to_ts(row.updated_at),
            ])?;
            Ok(())
        })
    }

    fn delete_rule(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn
                .prepare_cached("DELETE FROM alert_rules WHERE id = ?1")?
                .execute(params![id])?;
            Ok(n > 0)
        })
    }

    fn record_trigger(&self, rule_id: &str, at: DateTime<Utc>, trigger_count: i64) -> Result<()> {
        self.with_conn(|conn| {
            let n = conn
                .prepare_cached(
                    "UPDATE alert_rules SET last_triggered_at = ?2, trigger_count = ?3, \
                     updated_at = ?2 WHERE id = ?1",
                )?
                .execute(params![rule_id, to_ts(at), trigger_count])?;
            if n == 0 {
                return Err(StorageError::NotFound {
                    entity: "alert_rule",
                    id: rule_id.to_string(),
                });
            }
            Ok(())
        })
    }

    fn insert_webhook_log(&self, row: &WebhookLogRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO webhook_logs \
                 (id, alert_rule_id, event_id, url, status_code, response_time_ms, retry_count, \
                  success, error_message, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?
            .execute(params![
                row.id,
                row.alert_rule_id,
                row.event_id,
                row.url,
                row.status_code,
                row.response_time_ms,
                row.retry_count,
                row.success,
                row.error_message,
                to_ts(row.created_at),
            ])?;
            Ok(())
        })
    }

    fn list_webhook_logs(&self, rule_id: Option<&str>, limit: u32) -> Result<Vec<WebhookLogRow>> {
        self.with_conn(|conn| {
            let sql = match rule_id {
                Some(_) => {
                    "SELECT id, alert_rule_id, event_id, url, status_code, response_time_ms, \
                     retry_count, success, error_message, created_at FROM webhook_logs \
                     WHERE alert_rule_id = ?1 ORDER BY created_at DESC LIMIT ?2"
                }
                None => {
                    "SELECT id, alert_rule_id, event_id, url, status_code, response_time_ms, \
                     retry_count, success, error_message, created_at FROM webhook_logs \
                     ORDER BY created_at DESC LIMIT ?1"
                }
            };
            let mut stmt = conn.prepare_cached(sql)?;
            let mut rows = match rule_id {
                Some(rid) => stmt.query(params![rid, limit])?,
                None => stmt.query(params![limit])?,
            };
            let mut logs = Vec::new();
            while let Some(row) = rows.next()? {
                let created: String = row.get(9)?;
                logs.push(WebhookLogRow {
                    id: row.get(0)?,
                    alert_rule_id: row.get(1)?,
                    event_id: row.get(2)?,
                    url: row.get(3)?,
                    status_code: row.get(4)?,
                    response_time_ms: row.get(5)?,
                    retry_count: row.get(6)?,
                    success: row.get(7)?,
                    error_message: row.get(8)?,
                    created_at: parse_ts("created_at", created)?,
                });
            }
            Ok(logs)
        })
    }

    fn insert_notification(&self, row: &NotificationRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO notifications \
                 (id, event_id, rule_id, rule_name, event_description, thumbnail_url, is_read, \
                  created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?
            .execute(params![
                row.id,
                row.event_id,
                row.rule_id,
                row.rule_name,
                row.event_description,
                row.thumbnail_url,
                row.read,
                to_ts(row.created_at),
            ])?;
            Ok(())
        })
    }

    fn list_notifications(&self, unread_only: bool, limit: u32) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = if unread_only {
                "SELECT id, event_id, rule_id, rule_name, event_description, thumbnail_url, \
                 is_read, created_at FROM notifications WHERE is_read = 0 \
                 ORDER BY created_at DESC LIMIT ?1"
            } else {
                "SELECT id, event_id, rule_id, rule_name, event_description, thumbnail_url, \
                 is_read, created_at FROM notifications ORDER BY created_at DESC LIMIT ?1"
            };
            let mut stmt = conn.prepare_cached(sql)?;
            let mut rows = stmt.query(params![limit])?;
            let mut notifications = Vec::new();
            while let Some(row) = rows.next()? {
                let created: String = row.get(7)?;
                notifications.push(NotificationRow {
                    id: row.get(0)?,
                    event_id: row.get(1)?,
                    rule_id: row.get(2)?,
                    rule_name: row.get(3)?,
                    event_description: row.get(4)?,
                    thumbnail_url: row.get(5)?,
                    read: row.get(6)?,
                    created_at: parse_ts("created_at", created)?,
                });
            }
            Ok(notifications)
        })
    }

    fn mark_notification_read(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn
                .prepare_cached("UPDATE notifications SET is_read = 1 WHERE id = ?1")?
                .execute(params![id])?;
            Ok(n > 0)
        })
    }

    fn upsert_device(&self, row: &DeviceRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(
                "INSERT INTO devices \
                 (id, user_id, device_id, platform, push_token, quiet_hours_enabled, \
                  quiet_hours_start, quiet_hours_end, quiet_hours_timezone, override_critical, \
                  created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
                 ON CONFLICT(device_id) DO UPDATE SET \
                  user_id = ?2, platform = ?4, push_token = ?5, quiet_hours_enabled = ?6, \
                  quiet_hours_start = ?7, quiet_hours_end = ?8, quiet_hours_timezone = ?9, \
                  override_critical = ?10, updated_at = ?12",
            )?
            .execute(params![
                row.id,
                row.user_id,
                row.device_id,
                row.platform,
                row.push_token,
                row.quiet_hours_enabled,
                row.quiet_hours_start,
                row.quiet_hours_end,
                row.quiet_hours_timezone,
                row.override_critical,
                to_ts(row.created_at),
                to_ts(row.updated_at),
            ])?;
            Ok(())
        })
    }

    fn list_user_devices(&self, user_id: &str) -> Result<Vec<DeviceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, user_id, device_id, platform, push_token, quiet_hours_enabled, \
                 quiet_hours_start, quiet_hours_end, quiet_hours_timezone, override_critical, \
                 created_at, updated_at FROM devices WHERE user_id = ?1 ORDER BY created_at",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            read_devices(&mut rows)
        })
    }

    fn list_devices(&self) -> Result<Vec<DeviceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, user_id, device_id, platform, push_token, quiet_hours_enabled, \
                 quiet_hours_start, quiet_hours_end, quiet_hours_timezone, override_critical, \
                 created_at, updated_at FROM devices ORDER BY created_at",
            )?;
            let mut rows = stmt.query([])?;
            read_devices(&mut rows)
        })
    }

    fn delete_device(&self, device_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn
                .prepare_cached("DELETE FROM devices WHERE device_id = ?1")?
                .execute(params![device_id])?;
            Ok(n > 0)
        })
    }
}

fn read_devices(rows: &mut rusqlite::Rows<'_>) -> Result<Vec<DeviceRow>> {
    let mut devices = Vec::new();
    while let Some(row) = rows.next()? {
        let created: String = row.get(10)?;
        let updated: String = row.get(11)?;
        devices.push(DeviceRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            device_id: row.get(2)?,
            platform: row.get(3)?,
            push_token: row.get(4)?,
            quiet_hours_enabled: row.get(5)?,
            quiet_hours_start: row.get(6)?,
            quiet_hours_end: row.get(7)?,
            quiet_hours_timezone: row.get(8)?,
            override_critical: row.get(9)?,
            created_at: parse_ts("created_at", created)?,
            updated_at: parse_ts("updated_at", updated)?,
        });
    }
    Ok(devices)
}
