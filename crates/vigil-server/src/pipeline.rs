//! The end-to-end evaluation pipeline: event in, outcomes out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::RwLock;
use vigil_alert::{match_rules, AlertRule};
use vigil_common::types::DetectionEvent;
use vigil_storage::AlertStore;

use crate::dispatcher::{ActionDispatcher, DispatchOutcome};

/// Evaluates incoming detection events against the loaded rule set and
/// dispatches the actions of every rule that matches.
///
/// The rule set is held in memory and swapped wholesale on reload, so an
/// in-flight evaluation always sees one consistent snapshot.
pub struct AlertPipeline {
    store: Arc<dyn AlertStore>,
    dispatcher: ActionDispatcher,
    rules: RwLock<Vec<AlertRule>>,
    timezone: Tz,
}

impl AlertPipeline {
    pub fn new(store: Arc<dyn AlertStore>, dispatcher: ActionDispatcher, timezone: Tz) -> Self {
        Self {
            store,
            dispatcher,
            rules: RwLock::new(Vec::new()),
            timezone,
        }
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Loads all persisted rules, replacing the in-memory set.
    ///
    /// Rules whose condition/action JSON fails to parse are skipped with a
    /// warning; one bad rule never takes down the others. Cooldown state is
    /// seeded from the persisted bookkeeping and pruned of deleted rules.
    ///
    /// Returns the number of rules now active.
    ///
    /// # Errors
    ///
    /// Propagates storage failures; the previous rule set stays active.
    pub async fn reload_rules(&self) -> anyhow::Result<usize> {
        let rows = self.store.list_rules()?;
        let cooldowns = self.dispatcher.cooldowns();

        let mut loaded = Vec::with_capacity(rows.len());
        for row in &rows {
            match AlertRule::parse(
                &row.id,
                &row.name,
                row.enabled,
                &row.conditions_json,
                &row.actions_json,
                row.cooldown_minutes,
            ) {
                Ok(rule) => {
                    cooldowns.seed(
                        &rule.id,
                        row.last_triggered_at,
                        row.trigger_count.max(0) as u64,
                    );
                    loaded.push(rule);
                }
                Err(e) => {
                    tracing::warn!(
                        rule_id = %row.id,
                        rule_name = %row.name,
                        error = %e,
                        "Skipping rule with malformed configuration"
                    );
                }
            }
        }

        let keep: Vec<String> = loaded.iter().map(|r| r.id.clone()).collect();
        cooldowns.retain_rules(&keep);

        let count = loaded.len();
        *self.rules.write().await = loaded;
        tracing::info!(count, skipped = rows.len() - count, "Alert rules loaded");
        Ok(count)
    }

    pub async fn rule_count(&self) -> usize {
        self.rules.read().await.len()
    }

    /// Evaluates `event` at the current time.
    pub async fn evaluate_and_dispatch(
        &self,
        event: &DetectionEvent,
    ) -> Vec<anyhow::Result<DispatchOutcome>> {
        self.evaluate_and_dispatch_at(event, Utc::now()).await
    }

    /// Evaluates `event` with an injected clock, dispatching every matched
    /// rule. Per-rule failures are isolated: each matched rule yields its
    /// own result, in rule-set order.
    pub async fn evaluate_and_dispatch_at(
        &self,
        event: &DetectionEvent,
        now: DateTime<Utc>,
    ) -> Vec<anyhow::Result<DispatchOutcome>> {
        // Matching is cheap; dispatching awaits outbound HTTP. The rule
        // set is cloned out so the lock is never held across a network
        // call and reloads cannot stall evaluation behind a slow target.
        let matched: Vec<AlertRule> = {
            let rules = self.rules.read().await;
            match_rules(event, &rules, self.timezone)
                .into_iter()
                .cloned()
                .collect()
        };
        if matched.is_empty() {
            tracing::debug!(event_id = %event.id, "No rules matched");
            return Vec::new();
        }
        tracing::debug!(
            event_id = %event.id,
            camera_id = %event.camera_id,
            matched = matched.len(),
            "Rules matched, dispatching"
        );

        futures::future::join_all(
            matched
                .iter()
                .map(|rule| self.dispatcher.dispatch_at(event, rule, now)),
        )
        .await
    }
}
