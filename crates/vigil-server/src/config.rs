use anyhow::{Context, Result};
use serde::Deserialize;
use vigil_notify::push::{ApnsConfig, FcmConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Public base URL used when generating signed thumbnail links.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Secret for HMAC-signing thumbnail URLs.
    #[serde(default = "default_signing_secret")]
    pub signing_secret: String,

    /// Lifetime of signed thumbnail URLs, seconds.
    #[serde(default = "default_thumbnail_ttl_secs")]
    pub thumbnail_ttl_secs: u64,

    /// IANA timezone used for rule time-of-day/day-of-week matching.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Per-attempt timeout for outbound webhook/push HTTP calls, seconds.
    #[serde(default = "default_outbound_timeout_secs")]
    pub outbound_timeout_secs: u64,

    /// CORS allowed origins; empty allows all (development mode).
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    /// APNS credentials; push to iOS devices is disabled when absent.
    #[serde(default)]
    pub apns: Option<ApnsConfig>,

    /// FCM credentials; push to Android devices is disabled when absent.
    #[serde(default)]
    pub fcm: Option<FcmConfig>,
}

impl ServerConfig {
    /// Loads the config from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file '{path}'"))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            public_base_url: default_public_base_url(),
            signing_secret: default_signing_secret(),
            thumbnail_ttl_secs: default_thumbnail_ttl_secs(),
            timezone: default_timezone(),
            outbound_timeout_secs: default_outbound_timeout_secs(),
            cors_allowed_origins: Vec::new(),
            apns: None,
            fcm: None,
        }
    }
}

fn default_http_port() -> u16 {
    8420
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8420".to_string()
}

fn default_signing_secret() -> String {
    "change-me".to_string()
}

fn default_thumbnail_ttl_secs() -> u64 {
    60
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_outbound_timeout_secs() -> u64 {
    10
}
