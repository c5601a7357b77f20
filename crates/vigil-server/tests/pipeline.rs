//! End-to-end pipeline tests against an in-memory store and a loopback
//! webhook receiver.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use vigil_alert::cooldown::CooldownTracker;
use vigil_common::types::DetectionEvent;
use vigil_notify::dispatch::PushDispatchService;
use vigil_notify::signed_url::SignedUrlService;
use vigil_notify::webhook::WebhookClient;
use vigil_server::dispatcher::ActionDispatcher;
use vigil_server::pipeline::AlertPipeline;
use vigil_server::ws::BroadcastHub;
use vigil_storage::{AlertRuleRow, AlertStore, SqliteStore};

fn store_with_rule(id: &str, conditions: &str, actions: &str, cooldown_minutes: i64) -> Arc<SqliteStore> {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let now = Utc::now();
    store
        .upsert_rule(&AlertRuleRow {
            id: id.to_string(),
            name: format!("rule {id}"),
            enabled: true,
            conditions_json: conditions.to_string(),
            actions_json: actions.to_string(),
            cooldown_minutes,
            last_triggered_at: None,
            trigger_count: 0,
            created_at: now,
            updated_at: now,
        })
        .unwrap();
    store
}

async fn build_pipeline(store: Arc<SqliteStore>) -> (AlertPipeline, Arc<BroadcastHub>) {
    let hub = Arc::new(BroadcastHub::new());
    let dispatcher = ActionDispatcher::new(
        store.clone(),
        Arc::new(CooldownTracker::new()),
        hub.clone(),
        WebhookClient::new(Duration::from_secs(2)).unwrap(),
        PushDispatchService::new(),
        SignedUrlService::new("test-secret"),
        "http://localhost:8420".to_string(),
        60,
    );
    let pipeline = AlertPipeline::new(store, dispatcher, chrono_tz::UTC);
    pipeline.reload_rules().await.unwrap();
    (pipeline, hub)
}

async fn spawn_receiver(hits: Arc<AtomicUsize>) -> SocketAddr {
    let app = Router::new()
        .route(
            "/hook",
            post(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::OK
            }),
        )
        .with_state(hits);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn package_event(id: &str, at: DateTime<Utc>) -> DetectionEvent {
    DetectionEvent {
        id: id.to_string(),
        camera_id: "front_door".to_string(),
        timestamp: at,
        description: "a delivery person leaving a package on the porch".to_string(),
        confidence: 91,
        objects_detected: vec!["person".to_string(), "package".to_string()],
        audio_event_type: None,
        entity_id: None,
    }
}

// The motivating scenario: "notify me when a package is delivered, but
// not more than once every 10 minutes".
#[tokio::test]
async fn package_delivery_scenario() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = spawn_receiver(hits.clone()).await;

    let conditions = r#"{
        "object_types": ["package"],
        "camera_ids": ["front_door"],
        "time_window": {"start": "09:00", "end": "18:00"}
    }"#;
    let actions = format!(
        r#"{{"dashboard_notification": true, "webhook": {{"url": "http://{addr}/hook"}}}}"#
    );
    let store = store_with_rule("pkg-1", conditions, &actions, 10);
    let (pipeline, hub) = build_pipeline(store.clone()).await;

    // A dashboard is watching
    let mut dash_rx = hub.connect("dash-1").await;

    // Monday 14:00 UTC, inside the window
    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();

    let results = pipeline
        .evaluate_and_dispatch_at(&package_event("evt-1", t0), t0)
        .await;
    assert_eq!(results.len(), 1);
    let outcome = results.into_iter().next().unwrap().unwrap();
    assert!(outcome.triggered);
    assert!(outcome.notification_id.is_some());
    assert_eq!(outcome.broadcast_count, Some(1));
    let webhook = outcome.webhook.expect("webhook action ran");
    assert!(webhook.success);
    assert_eq!(webhook.status_code, 200);
    assert_eq!(webhook.retry_count, 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // The dashboard received the broadcast
    let msg = dash_rx.recv().await.expect("broadcast message");
    let axum::extract::ws::Message::Text(text) = msg else {
        panic!("expected text frame");
    };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "notification");
    assert_eq!(value["payload"]["event_id"], "evt-1");

    // Persisted side effects
    let notifications = store.list_notifications(false, 10).unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0]
        .thumbnail_url
        .as_deref()
        .unwrap()
        .contains("/v1/events/evt-1/thumbnail"));
    let logs = store.list_webhook_logs(Some("pkg-1"), 10).unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].success);
    let rule = store.get_rule("pkg-1").unwrap();
    assert_eq!(rule.trigger_count, 1);
    assert_eq!(rule.last_triggered_at, Some(t0));

    // Second delivery 5 minutes later: matched but swallowed by cooldown
    let t1 = t0 + chrono::Duration::minutes(5);
    let results = pipeline
        .evaluate_and_dispatch_at(&package_event("evt-2", t1), t1)
        .await;
    assert_eq!(results.len(), 1);
    let outcome = results.into_iter().next().unwrap().unwrap();
    assert!(!outcome.triggered);
    assert!(outcome.webhook.is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(store.get_rule("pkg-1").unwrap().trigger_count, 1);

    // Third delivery past the window: triggers again
    let t2 = t0 + chrono::Duration::minutes(11);
    let results = pipeline
        .evaluate_and_dispatch_at(&package_event("evt-3", t2), t2)
        .await;
    let outcome = results.into_iter().next().unwrap().unwrap();
    assert!(outcome.triggered);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    let rule = store.get_rule("pkg-1").unwrap();
    assert_eq!(rule.trigger_count, 2);
    assert_eq!(rule.last_triggered_at, Some(t2));
}

// Stranger detection: fire only when no entity was recognized.
#[tokio::test]
async fn stranger_detection_matches_unrecognized_only() {
    let conditions = r#"{"entity_match_mode": "unknown"}"#;
    let actions = r#"{"dashboard_notification": true}"#;
    let store = store_with_rule("stranger-1", conditions, actions, 0);
    let (pipeline, _hub) = build_pipeline(store.clone()).await;

    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap();

    let mut known = package_event("evt-known", t0);
    known.entity_id = Some("family_member_1".to_string());
    let results = pipeline.evaluate_and_dispatch_at(&known, t0).await;
    assert!(results.is_empty(), "recognized entity must not match");

    let stranger = package_event("evt-stranger", t0);
    let results = pipeline.evaluate_and_dispatch_at(&stranger, t0).await;
    assert_eq!(results.len(), 1);
    assert!(results.into_iter().next().unwrap().unwrap().triggered);

    let notifications = store.list_notifications(true, 10).unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].event_id, "evt-stranger");
}

// Outside the rule's time window, nothing fires.
#[tokio::test]
async fn time_window_excludes_night_events() {
    let conditions = r#"{
        "object_types": ["package"],
        "time_window": {"start": "09:00", "end": "18:00"}
    }"#;
    let store = store_with_rule("pkg-day", conditions, r#"{"dashboard_notification": true}"#, 10);
    let (pipeline, _hub) = build_pipeline(store).await;

    let night = Utc.with_ymd_and_hms(2026, 3, 2, 3, 0, 0).unwrap();
    let results = pipeline
        .evaluate_and_dispatch_at(&package_event("evt-night", night), night)
        .await;
    assert!(results.is_empty());
}

// A rule with a malformed condition blob is skipped at load; valid rules
// still work.
#[tokio::test]
async fn malformed_rule_is_skipped_at_load() {
    let store = store_with_rule("bad-1", "{not json", r#"{"dashboard_notification": true}"#, 0);
    let now = Utc::now();
    store
        .upsert_rule(&AlertRuleRow {
            id: "good-1".to_string(),
            name: "good".to_string(),
            enabled: true,
            conditions_json: "{}".to_string(),
            actions_json: r#"{"dashboard_notification": true}"#.to_string(),
            cooldown_minutes: 0,
            last_triggered_at: None,
            trigger_count: 0,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    let (pipeline, _hub) = build_pipeline(store).await;
    assert_eq!(pipeline.rule_count().await, 1);

    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
    let results = pipeline
        .evaluate_and_dispatch_at(&package_event("evt-1", t0), t0)
        .await;
    assert_eq!(results.len(), 1, "only the good rule fires");
}

// Cooldown state is seeded from persisted bookkeeping at load, so a
// restart does not re-arm a recently fired rule.
#[tokio::test]
async fn cooldown_survives_reload() {
    let conditions = r#"{"object_types": ["package"]}"#;
    let store = store_with_rule("pkg-1", conditions, r#"{"dashboard_notification": true}"#, 10);

    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
    store.record_trigger("pkg-1", t0, 1).unwrap();

    // Fresh pipeline simulates a restart
    let (pipeline, _hub) = build_pipeline(store.clone()).await;

    let t1 = t0 + chrono::Duration::minutes(5);
    let results = pipeline
        .evaluate_and_dispatch_at(&package_event("evt-1", t1), t1)
        .await;
    let outcome = results.into_iter().next().unwrap().unwrap();
    assert!(!outcome.triggered, "seeded cooldown still applies");
    assert_eq!(store.get_rule("pkg-1").unwrap().trigger_count, 1);
}

// A dispatch stuck on a slow webhook target must not hold the rule set
// hostage: reloads and evaluation of other events proceed immediately.
#[tokio::test]
async fn slow_webhook_does_not_stall_reload_or_other_events() {
    let app = Router::new().route(
        "/hook",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            StatusCode::OK
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let actions = format!(r#"{{"webhook": {{"url": "http://{addr}/hook"}}}}"#);
    let store = store_with_rule("slow-1", r#"{"object_types": ["package"]}"#, &actions, 0);
    let now = Utc::now();
    store
        .upsert_rule(&AlertRuleRow {
            id: "cat-1".to_string(),
            name: "cat watcher".to_string(),
            enabled: true,
            conditions_json: r#"{"object_types": ["cat"]}"#.to_string(),
            actions_json: r#"{"dashboard_notification": true}"#.to_string(),
            cooldown_minutes: 0,
            last_triggered_at: None,
            trigger_count: 0,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    let (pipeline, _hub) = build_pipeline(store).await;
    let pipeline = Arc::new(pipeline);

    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
    let slow = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            pipeline
                .evaluate_and_dispatch_at(&package_event("evt-slow", t0), t0)
                .await
        })
    };
    // Let the webhook call get in flight
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio::time::timeout(Duration::from_millis(500), pipeline.reload_rules())
        .await
        .expect("reload must not wait for the in-flight dispatch")
        .unwrap();

    let mut cat = package_event("evt-cat", t0);
    cat.objects_detected = vec!["cat".to_string()];
    let results = tokio::time::timeout(
        Duration::from_millis(500),
        pipeline.evaluate_and_dispatch_at(&cat, t0),
    )
    .await
    .expect("other events must not wait for the in-flight dispatch");
    assert_eq!(results.len(), 1);
    assert!(results.into_iter().next().unwrap().unwrap().triggered);

    // The slow dispatch still completes normally
    let outcome = slow
        .await
        .unwrap()
        .into_iter()
        .next()
        .unwrap()
        .unwrap();
    assert!(outcome.webhook.expect("webhook action ran").success);
}

// An unreachable webhook target is recorded as a failed sequence; the
// dashboard notification still goes out.
#[tokio::test]
async fn webhook_failure_does_not_block_dashboard() {
    // Port from the ephemeral range with nothing listening
    let conditions = r#"{"object_types": ["package"]}"#;
    let actions = r#"{
        "dashboard_notification": true,
        "webhook": {"url": "http://127.0.0.1:1/hook"}
    }"#;
    let store = store_with_rule("pkg-1", conditions, actions, 0);
    let (pipeline, _hub) = build_pipeline(store.clone()).await;

    let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
    let results = pipeline
        .evaluate_and_dispatch_at(&package_event("evt-1", t0), t0)
        .await;
    let outcome = results.into_iter().next().unwrap().unwrap();
    assert!(outcome.triggered);
    assert!(outcome.notification_id.is_some());

    let webhook = outcome.webhook.expect("webhook action ran");
    assert!(!webhook.success);
    assert_eq!(webhook.status_code, 0);
    assert_eq!(webhook.retry_count, 2);

    let logs = store.list_webhook_logs(Some("pkg-1"), 10).unwrap();
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].success);
    assert_eq!(store.list_notifications(false, 10).unwrap().len(), 1);
}
