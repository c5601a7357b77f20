//! Alert rule evaluation for camera detection events.
//!
//! Rules are stored as JSON condition/action blobs and parsed once at load
//! time into typed [`AlertRule`] values. Matching ([`matcher`]) is a pure
//! function over the parsed rules; trigger admission ([`cooldown`]) is the
//! only stateful part and serializes check-then-act per rule ID.

pub mod conditions;
pub mod cooldown;
pub mod matcher;


pub use conditions::{Condition, ConditionError, EntityMatch, RuleActions, WebhookAction};
pub use cooldown::CooldownTracker;
pub use matcher::match_rules;

use chrono::Duration;

/// A fully parsed alert rule: predicate + actions + cooldown.
///
/// Built from the persisted row via [`AlertRule::parse`]; rows whose JSON
/// fails to parse are rejected there and must be skipped by the loader
/// (a malformed rule never matches).
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: RuleActions,
    pub cooldown: Duration,
}

impl AlertRule {
    /// Parses a rule from its persisted representation.
    ///
    /// `conditions_json` is the loosely-typed predicate blob edited by
    /// users; `actions_json` carries the dashboard/webhook action config.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError`] if either blob is malformed. Callers
    /// treat that as "rule never matches" and log a configuration warning.
    pub fn parse(
        id: &str,
        name: &str,
        enabled: bool,
        conditions_json: &str,
        actions_json: &str,
        cooldown_minutes: i64,
    ) -> Result<Self, ConditionError> {
        let conditions = conditions::parse_conditions(conditions_json)?;
        let actions: RuleActions = serde_json::from_str(actions_json)
            .map_err(|e| ConditionError::Malformed(format!("actions: {e}")))?;
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            enabled,
            conditions,
            actions,
            cooldown: Duration::minutes(cooldown_minutes.max(0)),
        })
    }
}
