//! HTTP surface tests: the router served on a loopback listener, driven
//! with a real client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use vigil_alert::cooldown::CooldownTracker;
use vigil_notify::dispatch::PushDispatchService;
use vigil_notify::signed_url::SignedUrlService;
use vigil_notify::webhook::WebhookClient;
use vigil_server::config::ServerConfig;
use vigil_server::dispatcher::ActionDispatcher;
use vigil_server::pipeline::AlertPipeline;
use vigil_server::state::AppState;
use vigil_server::ws::BroadcastHub;
use vigil_storage::{AlertRuleRow, AlertStore, SqliteStore};

const SECRET: &str = "test-secret";

async fn spawn_app() -> (SocketAddr, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let now = Utc::now();
    store
        .upsert_rule(&AlertRuleRow {
            id: "rule-1".to_string(),
            name: "any person".to_string(),
            enabled: true,
            conditions_json: r#"{"object_types": ["person"]}"#.to_string(),
            actions_json: r#"{"dashboard_notification": true}"#.to_string(),
            cooldown_minutes: 0,
            last_triggered_at: None,
            trigger_count: 0,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

    let config = ServerConfig {
        signing_secret: SECRET.to_string(),
        ..ServerConfig::default()
    };
    let hub = Arc::new(BroadcastHub::new());
    let dispatcher = ActionDispatcher::new(
        store.clone(),
        Arc::new(CooldownTracker::new()),
        hub.clone(),
        WebhookClient::new(Duration::from_secs(2)).unwrap(),
        PushDispatchService::new(),
        SignedUrlService::new(SECRET),
        config.public_base_url.clone(),
        config.thumbnail_ttl_secs,
    );
    let pipeline = Arc::new(AlertPipeline::new(store.clone(), dispatcher, chrono_tz::UTC));
    pipeline.reload_rules().await.unwrap();

    let state = AppState {
        config: Arc::new(config),
        store: store.clone(),
        hub,
        pipeline,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = vigil_server::app::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, store)
}

#[tokio::test]
async fn health_reports_loaded_rules() {
    let (addr, _store) = spawn_app().await;
    let body: serde_json::Value = reqwest::get(format!("http://{addr}/v1/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["rules_loaded"], 1);
}

#[tokio::test]
async fn ingest_triggers_rule_and_lists_notification() {
    let (addr, store) = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/v1/events"))
        .json(&serde_json::json!({
            "id": "evt-1",
            "camera_id": "backyard",
            "timestamp": Utc::now().to_rfc3339(),
            "description": "a person walking across the lawn",
            "confidence": 80,
            "objects_detected": ["person"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["matched"], 1);
    assert_eq!(body["outcomes"][0]["triggered"], true);

    let body: serde_json::Value = client
        .get(format!("http://{addr}/v1/notifications?unread_only=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["notifications"].as_array().unwrap().len(), 1);
    let notification_id = body["notifications"][0]["id"].as_str().unwrap().to_string();

    // Mark it read; it drops out of the unread view
    let resp = client
        .post(format!("http://{addr}/v1/notifications/{notification_id}/read"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(store.list_notifications(true, 10).unwrap().len(), 0);
}

#[tokio::test]
async fn ingest_without_matches_reports_zero() {
    let (addr, _store) = spawn_app().await;
    let body: serde_json::Value = reqwest::Client::new()
        .post(format!("http://{addr}/v1/events"))
        .json(&serde_json::json!({
            "id": "evt-cat",
            "camera_id": "backyard",
            "timestamp": Utc::now().to_rfc3339(),
            "description": "a cat",
            "confidence": 70,
            "objects_detected": ["cat"],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["matched"], 0);
}

#[tokio::test]
async fn mark_read_unknown_id_is_404() {
    let (addr, _store) = spawn_app().await;
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/v1/notifications/nope/read"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn thumbnail_rejects_bad_signature() {
    let (addr, _store) = spawn_app().await;
    let client = reqwest::Client::new();
    let expires = Utc::now().timestamp() + 60;

    let resp = client
        .get(format!(
            "http://{addr}/v1/events/evt-1/thumbnail?expires={expires}&sig=deadbeef"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Missing query parameters entirely is also a rejection
    let resp = client
        .get(format!("http://{addr}/v1/events/evt-1/thumbnail"))
        .send()
        .await
        .unwrap();
    assert_ne!(resp.status(), 200);
}

#[tokio::test]
async fn thumbnail_valid_signature_for_missing_media_is_404() {
    let (addr, _store) = spawn_app().await;
    let signer = SignedUrlService::new(SECRET);
    let url = signer.generate("evt-1", &format!("http://{addr}"), 60);

    let resp = reqwest::get(url).await.unwrap();
    assert_eq!(resp.status(), 404);
}
