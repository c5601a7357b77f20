use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Errors raised while parsing a rule's persisted condition/action blobs.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    /// The JSON blob could not be deserialized into the expected shape.
    #[error("Alert: malformed rule configuration: {0}")]
    Malformed(String),

    /// A time-of-day value was not a valid `HH:MM` string.
    #[error("Alert: invalid time-of-day '{0}' (expected HH:MM)")]
    InvalidTime(String),

    /// A day-of-week value was outside 1..=7 (1 = Monday).
    #[error("Alert: invalid day-of-week {0} (expected 1-7)")]
    InvalidDayOfWeek(u8),
}

/// Entity recognition matching mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityMatch {
    /// Any event matches, recognized or not.
    Any,
    /// Only events recognized as this specific entity.
    Specific(String),
    /// Only events with no recognized entity (stranger detection).
    Unknown,
}

/// One sub-condition of a rule predicate.
///
/// A rule matches when every one of its conditions holds; an absent or
/// empty sub-condition in the source blob is a wildcard and produces no
/// `Condition` at all.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Detected-object set must intersect this allow-list.
    ObjectTypes(HashSet<String>),
    /// Event camera must be in this allow-list.
    Cameras(HashSet<String>),
    /// Local time-of-day must fall within `[start, end)`. Same-day only;
    /// a window with `start >= end` matches nothing.
    TimeWindow { start: NaiveTime, end: NaiveTime },
    /// Local weekday must be in this set (1 = Monday .. 7 = Sunday).
    DaysOfWeek(HashSet<u8>),
    /// Event confidence must be at least this value.
    MinConfidence(u8),
    /// If the event carries an audio event type, it must be in this list.
    AudioTypes(HashSet<String>),
    /// Entity recognition constraint.
    Entity(EntityMatch),
}

/// Webhook action configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookAction {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// The actions a rule executes when it fires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleActions {
    /// Create a dashboard notification record (and fan out to live
    /// dashboards and registered devices).
    #[serde(default)]
    pub dashboard_notification: bool,
    /// Mark pushes from this rule critical: they bypass device quiet
    /// hours when the device opted into the override.
    #[serde(default)]
    pub critical: bool,
    /// POST the event to an external webhook.
    #[serde(default)]
    pub webhook: Option<WebhookAction>,
}

/// Wire shape of the persisted condition blob. All fields optional;
/// absent or empty means "don't constrain on this attribute".
#[derive(Debug, Deserialize)]
struct ConditionsSpec {
    #[serde(default)]
    object_types: Vec<String>,
    #[serde(default)]
    camera_ids: Vec<String>,
    #[serde(default)]
    time_window: Option<TimeWindowSpec>,
    #[serde(default)]
    days_of_week: Vec<u8>,
    #[serde(default)]
    min_confidence: Option<u8>,
    #[serde(default)]
    audio_event_types: Vec<String>,
    #[serde(default)]
    entity_match_mode: Option<String>,
    #[serde(default)]
    entity_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeWindowSpec {
    start: String,
    end: String,
}

fn parse_hhmm(s: &str) -> Result<NaiveTime, ConditionError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ConditionError::InvalidTime(s.to_string()))
}

/// Parses the persisted condition blob into typed conditions, once, at
/// rule-load time. Empty allow-lists collapse to wildcards (no condition).
pub fn parse_conditions(json: &str) -> Result<Vec<Condition>, ConditionError> {
    let spec: ConditionsSpec =
        serde_json::from_str(json).map_err(|e| ConditionError::Malformed(e.to_string()))?;

    let mut conditions = Vec::new();

    if !spec.object_types.is_empty() {
        conditions.push(Condition::ObjectTypes(spec.object_types.into_iter().collect()));
    }
    if !spec.camera_ids.is_empty() {
        conditions.push(Condition::Cameras(spec.camera_ids.into_iter().collect()));
    }
    if let Some(tw) = spec.time_window {
        let start = parse_hhmm(&tw.start)?;
        let end = parse_hhmm(&tw.end)?;
        if start >= end {
            tracing::warn!(
                start = %tw.start,
                end = %tw.end,
                "Rule time window has start >= end; it will never match"
            );
        }
        conditions.push(Condition::TimeWindow { start, end });
    }
    if !spec.days_of_week.is_empty() {
        for &day in &spec.days_of_week {
            if !(1..=7).contains(&day) {
                return Err(ConditionError::InvalidDayOfWeek(day));
            }
        }
        conditions.push(Condition::DaysOfWeek(spec.days_of_week.into_iter().collect()));
    }
    if let Some(min) = spec.min_confidence {
        if min > 0 {
            conditions.push(Condition::MinConfidence(min));
        }
    }
    if !spec.audio_event_types.is_empty() {
        conditions.push(Condition::AudioTypes(
            spec.audio_event_types.into_iter().collect(),
        ));
    }
    match spec.entity_match_mode.as_deref() {
        None | Some("any") => {}
        Some("specific") => {
            let id = spec.entity_id.ok_or_else(|| {
                ConditionError::Malformed(
                    "entity_match_mode 'specific' requires entity_id".to_string(),
                )
            })?;
            conditions.push(Condition::Entity(EntityMatch::Specific(id)));
        }
        Some("unknown") => conditions.push(Condition::Entity(EntityMatch::Unknown)),
        Some(other) => {
            return Err(ConditionError::Malformed(format!(
                "unknown entity_match_mode: {other}"
            )))
        }
    }

    Ok(conditions)
}
