use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A detection produced by the (external) motion/AI pipeline.
///
/// This is the sole input to the alerting core. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub id: String,
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    /// AI-generated scene description (e.g., "a person carrying a package").
    pub description: String,
    /// Detection confidence, 0-100.
    pub confidence: u8,
    /// Object labels detected in the frame (e.g., `["person", "package"]`).
    #[serde(default)]
    pub objects_detected: Vec<String>,
    /// Classified audio event, if any (e.g., "glass_break", "doorbell").
    #[serde(default)]
    pub audio_event_type: Option<String>,
    /// Recognized person/vehicle identity; `None` means unrecognized.
    #[serde(default)]
    pub entity_id: Option<String>,
}

/// Device platform for push delivery routing.
///
/// # Examples
///
/// ```
/// use vigil_common::types::Platform;
///
/// let p: Platform = "ios".parse().unwrap();
/// assert_eq!(p, Platform::Ios);
/// assert_eq!(p.to_string(), "ios");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Ios => write!(f, "ios"),
            Platform::Android => write!(f, "android"),
            Platform::Web => write!(f, "web"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "web" => Ok(Platform::Web),
            _ => Err(format!("unknown platform: {s}")),
        }
    }
}

/// The notification content pushed to dashboards and mobile devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub event_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub camera_id: String,
    pub title: String,
    pub body: String,
    /// Short-lived signed URL to the event thumbnail, if media exists.
    pub thumbnail_url: Option<String>,
    /// Critical notifications may bypass device quiet hours.
    pub critical: bool,
    pub timestamp: DateTime<Utc>,
}

/// Terminal status of one push delivery attempt to one device.
///
/// # Examples
///
/// ```
/// use vigil_common::types::DeliveryStatus;
///
/// assert!(DeliveryStatus::InvalidToken.is_permanent_failure());
/// assert!(!DeliveryStatus::ServerError.is_permanent_failure());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Success,
    Failed,
    /// Provider reported the token is permanently dead; the device record
    /// should be flagged for cleanup by the caller.
    InvalidToken,
    RateLimited,
    AuthError,
    ServerError,
    /// Skipped because the device is inside its quiet-hours window.
    Suppressed,
}

impl DeliveryStatus {
    /// Whether the provider reported a permanent token failure.
    pub fn is_permanent_failure(&self) -> bool {
        matches!(self, DeliveryStatus::InvalidToken)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::InvalidToken => "invalid_token",
            DeliveryStatus::RateLimited => "rate_limited",
            DeliveryStatus::AuthError => "auth_error",
            DeliveryStatus::ServerError => "server_error",
            DeliveryStatus::Suppressed => "suppressed",
        };
        write!(f, "{s}")
    }
}

/// Result of one push delivery to one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub device_id: String,
    pub platform: Platform,
    pub status: DeliveryStatus,
    pub error: Option<String>,
}

/// Truncate a string to at most `max_len` bytes, snapping back to the
/// nearest char boundary so multi-byte characters are never split.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips() {
        for p in [Platform::Ios, Platform::Android, Platform::Web] {
            let parsed: Platform = p.to_string().parse().unwrap();
            assert_eq!(parsed, p);
        }
        assert!("blackberry".parse::<Platform>().is_err());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 3), "hel");
        // "é" is two bytes; cutting at 1 must not split it
        assert_eq!(truncate_str("é", 1), "");
    }
}
