use crate::conditions::{Condition, EntityMatch};
use crate::AlertRule;
use chrono::Datelike;
use chrono_tz::Tz;
use vigil_common::types::DetectionEvent;

impl Condition {
    /// Evaluates this sub-condition against an event. Time-of-day and
    /// weekday are computed in `tz`, the deployment's local timezone.
    pub fn matches(&self, event: &DetectionEvent, tz: Tz) -> bool {
        match self {
            Condition::ObjectTypes(allowed) => {
                event.objects_detected.iter().any(|o| allowed.contains(o))
            }
            Condition::Cameras(allowed) => allowed.contains(&event.camera_id),
            Condition::TimeWindow { start, end } => {
                let local = event.timestamp.with_timezone(&tz).time();
                local >= *start && local < *end
            }
            Condition::DaysOfWeek(days) => {
                let weekday = event.timestamp.with_timezone(&tz).weekday();
                days.contains(&(weekday.number_from_monday() as u8))
            }
            Condition::MinConfidence(min) => event.confidence >= *min,
            Condition::AudioTypes(allowed) => match &event.audio_event_type {
                // Audio filter only constrains events that carry audio
                Some(audio) => allowed.contains(audio),
                None => true,
            },
            Condition::Entity(mode) => match mode {
                EntityMatch::Any => true,
                EntityMatch::Specific(id) => event.entity_id.as_deref() == Some(id.as_str()),
                EntityMatch::Unknown => event.entity_id.is_none(),
            },
        }
    }
}

impl AlertRule {
    /// Whether this rule's full predicate holds for `event`.
    /// Disabled rules never match.
    pub fn matches(&self, event: &DetectionEvent, tz: Tz) -> bool {
        self.enabled && self.conditions.iter().all(|c| c.matches(event, tz))
    }
}

/// Evaluates an event against a rule set.
///
/// Pure and deterministic: no side effects, independent per rule. An event
/// may match zero, one, or many rules; cooldown admission happens later.
pub fn match_rules<'a>(
    event: &DetectionEvent,
    rules: &'a [AlertRule],
    tz: Tz,
) -> Vec<&'a AlertRule> {
    rules.iter().filter(|r| r.matches(event, tz)).collect()
}
