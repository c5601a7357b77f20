use chrono::Utc;

use crate::config::ServerConfig;
use crate::dispatcher::push_device;
use crate::ws::BroadcastHub;
use vigil_common::types::Platform;
use vigil_storage::DeviceRow;

fn device_row(platform: &str, quiet_enabled: bool, timezone: &str) -> DeviceRow {
    let now = Utc::now();
    DeviceRow {
        id: "1".to_string(),
        user_id: "user-1".to_string(),
        device_id: "dev-1".to_string(),
        platform: platform.to_string(),
        push_token: "token".to_string(),
        quiet_hours_enabled: quiet_enabled,
        quiet_hours_start: "22:00".to_string(),
        quiet_hours_end: "07:00".to_string(),
        quiet_hours_timezone: timezone.to_string(),
        override_critical: true,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn push_device_maps_platform_and_quiet_hours() {
    let device = push_device(&device_row("ios", true, "America/New_York")).unwrap();
    assert_eq!(device.platform, Platform::Ios);
    let quiet = device.quiet_hours.unwrap();
    assert!(quiet.override_critical);
}

#[test]
fn push_device_skips_unknown_platform() {
    assert!(push_device(&device_row("blackberry", false, "UTC")).is_none());
}

#[test]
fn push_device_degrades_bad_timezone_to_no_suppression() {
    let device = push_device(&device_row("android", true, "Mars/Olympus")).unwrap();
    assert!(device.quiet_hours.is_none());
}

#[test]
fn push_device_ignores_quiet_hours_when_disabled() {
    let device = push_device(&device_row("android", false, "UTC")).unwrap();
    assert!(device.quiet_hours.is_none());
}

#[tokio::test]
async fn hub_broadcast_counts_and_stamps_timestamp() {
    let hub = BroadcastHub::new();
    let mut rx_a = hub.connect("a").await;
    let mut rx_b = hub.connect("b").await;

    let delivered = hub.broadcast(serde_json::json!({"type": "test"})).await;
    assert_eq!(delivered, 2);

    for rx in [&mut rx_a, &mut rx_b] {
        let msg = rx.recv().await.unwrap();
        let axum::extract::ws::Message::Text(text) = msg else {
            panic!("expected text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "test");
        assert!(value["timestamp"].is_string());
    }
}

#[tokio::test]
async fn hub_evicts_dead_connections() {
    let hub = BroadcastHub::new();
    let _rx_alive = hub.connect("alive").await;
    let rx_dead = hub.connect("dead").await;
    drop(rx_dead);

    assert_eq!(hub.connection_count().await, 2);
    let delivered = hub.broadcast(serde_json::json!({"type": "test"})).await;
    assert_eq!(delivered, 1);
    assert_eq!(hub.connection_count().await, 1);

    // Self-healed: the next broadcast sees only the live connection
    let delivered = hub.broadcast(serde_json::json!({"type": "test"})).await;
    assert_eq!(delivered, 1);
}

#[tokio::test]
async fn hub_disconnect_is_idempotent() {
    let hub = BroadcastHub::new();
    let _rx = hub.connect("a").await;
    hub.disconnect("a").await;
    hub.disconnect("a").await;
    assert_eq!(hub.connection_count().await, 0);
}

#[tokio::test]
async fn hub_shutdown_closes_and_clears() {
    let hub = BroadcastHub::new();
    let mut rx = hub.connect("a").await;
    hub.shutdown_all().await;
    assert_eq!(hub.connection_count().await, 0);
    let msg = rx.recv().await.unwrap();
    assert!(matches!(msg, axum::extract::ws::Message::Close(_)));
}

#[test]
fn config_defaults_fill_missing_fields() {
    let config: ServerConfig = toml::from_str(
        r#"
        signing_secret = "s3cret"
        timezone = "Europe/Berlin"
        "#,
    )
    .unwrap();
    assert_eq!(config.http_port, 8420);
    assert_eq!(config.thumbnail_ttl_secs, 60);
    assert_eq!(config.signing_secret, "s3cret");
    assert_eq!(config.timezone, "Europe/Berlin");
    assert!(config.apns.is_none());
}

#[test]
fn config_parses_push_providers() {
    let config: ServerConfig = toml::from_str(
        r#"
        signing_secret = "s3cret"

        [apns]
        topic = "com.example.vigil"
        auth_token = "apns-token"

        [fcm]
        project_id = "vigil-123"
        auth_token = "fcm-token"
        "#,
    )
    .unwrap();
    assert_eq!(config.apns.unwrap().topic, "com.example.vigil");
    assert_eq!(config.fcm.unwrap().project_id, "vigil-123");
}
