use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use vigil_alert::cooldown::CooldownTracker;
use vigil_notify::dispatch::PushDispatchService;
use vigil_notify::push::{ApnsProvider, FcmProvider};
use vigil_notify::signed_url::SignedUrlService;
use vigil_notify::webhook::WebhookClient;
use vigil_storage::SqliteStore;

use vigil_server::app;
use vigil_server::config::ServerConfig;
use vigil_server::dispatcher::ActionDispatcher;
use vigil_server::pipeline::AlertPipeline;
use vigil_server::state::AppState;
use vigil_server::ws::{start_heartbeat, BroadcastHub};

#[tokio::main]
async fn main() -> Result<()> {
    vigil_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vigil=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = match args.get(1) {
        Some(path) => ServerConfig::load(path)?,
        None => {
            tracing::info!("No config file given, using defaults");
            ServerConfig::default()
        }
    };

    run_server(config).await
}

async fn run_server(config: ServerConfig) -> Result<()> {
    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.data_dir,
        timezone = %config.timezone,
        "vigil-server starting"
    );

    if config.signing_secret == "change-me" {
        tracing::warn!(
            "Using the default signing secret. Set signing_secret in config for production use."
        );
    }

    let timezone: Tz = config
        .timezone
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown timezone '{}' in config", config.timezone))?;

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data dir '{}'", config.data_dir))?;
    let db_path = Path::new(&config.data_dir).join("vigil.db");
    let store = Arc::new(SqliteStore::open(&db_path)?);

    let outbound_timeout = Duration::from_secs(config.outbound_timeout_secs);

    let mut push = PushDispatchService::new();
    match &config.apns {
        Some(apns) => {
            push.register(Box::new(ApnsProvider::new(apns.clone(), outbound_timeout)?));
            tracing::info!(topic = %apns.topic, "APNS push enabled");
        }
        None => tracing::info!("APNS not configured, iOS push disabled"),
    }
    match &config.fcm {
        Some(fcm) => {
            push.register(Box::new(FcmProvider::new(fcm.clone(), outbound_timeout)?));
            tracing::info!(project_id = %fcm.project_id, "FCM push enabled");
        }
        None => tracing::info!("FCM not configured, Android push disabled"),
    }

    let hub = Arc::new(BroadcastHub::new());
    let dispatcher = ActionDispatcher::new(
        store.clone(),
        Arc::new(CooldownTracker::new()),
        hub.clone(),
        WebhookClient::new(outbound_timeout)?,
        push,
        SignedUrlService::new(&config.signing_secret),
        config.public_base_url.clone(),
        config.thumbnail_ttl_secs,
    );

    let pipeline = Arc::new(AlertPipeline::new(store.clone(), dispatcher, timezone));
    if let Err(e) = pipeline.reload_rules().await {
        tracing::error!(error = %e, "Failed to load alert rules from DB");
    }

    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        hub: hub.clone(),
        pipeline,
    };

    let heartbeat_handle = start_heartbeat(hub.clone());

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    let router = app::build_router(state);

    tracing::info!(http = %http_addr, "Server started");

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "HTTP server error");
    }

    heartbeat_handle.abort();
    hub.shutdown_all().await;
    tracing::info!("Server stopped");

    Ok(())
}
