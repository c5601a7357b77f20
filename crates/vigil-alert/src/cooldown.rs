use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Trigger bookkeeping for one rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerState {
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub trigger_count: u64,
}

/// Enforces the minimum inter-trigger interval per rule.
///
/// The check-then-act is atomic: [`CooldownTracker::try_claim`] holds one
/// lock across the window check and the state update, so two detections
/// arriving inside the same cooldown window cannot both pass. State is
/// seeded from storage at startup; the dispatcher persists the bookkeeping
/// after a successful claim.
pub struct CooldownTracker {
    states: Mutex<HashMap<String, TriggerState>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Seeds the tracker with persisted bookkeeping for a rule.
    pub fn seed(&self, rule_id: &str, last_triggered_at: Option<DateTime<Utc>>, trigger_count: u64) {
        let mut states = self.states.lock().unwrap();
        states.insert(
            rule_id.to_string(),
            TriggerState {
                last_triggered_at,
                trigger_count,
            },
        );
    }

    /// Read-only check: would a trigger at `now` be admitted?
    ///
    /// Advisory only; use [`CooldownTracker::try_claim`] on the dispatch
    /// path so the check and the record are a single atomic step.
    pub fn may_trigger(&self, rule_id: &str, cooldown: Duration, now: DateTime<Utc>) -> bool {
        let states = self.states.lock().unwrap();
        match states.get(rule_id).and_then(|s| s.last_triggered_at) {
            None => true,
            Some(last) => now - last >= cooldown,
        }
    }

    /// Atomically claims a trigger for `rule_id` at `now`.
    ///
    /// Returns the new trigger count on success, or `None` if the cooldown
    /// window has not elapsed (including losing a race with a concurrent
    /// claim). Losing is a normal outcome, not an error.
    pub fn try_claim(&self, rule_id: &str, cooldown: Duration, now: DateTime<Utc>) -> Option<u64> {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(rule_id.to_string()).or_default();
        if let Some(last) = state.last_triggered_at {
            if now - last < cooldown {
                return None;
            }
        }
        state.last_triggered_at = Some(now);
        state.trigger_count += 1;
        Some(state.trigger_count)
    }

    /// Current bookkeeping for a rule, if any trigger has been recorded
    /// or seeded.
    pub fn state(&self, rule_id: &str) -> Option<TriggerState> {
        self.states.lock().unwrap().get(rule_id).copied()
    }

    /// Drops state for rules no longer present (rule deleted/reloaded).
    pub fn retain_rules(&self, keep: &[String]) {
        let mut states = self.states.lock().unwrap();
        states.retain(|id, _| keep.iter().any(|k| k == id));
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new()
    }
}
