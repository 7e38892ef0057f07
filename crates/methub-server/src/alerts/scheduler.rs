use std::sync::Arc;

use chrono::Utc;
use methub_alert::engine::{build_condition, cooldown_active};
use methub_common::types::{AlertStatus, LogCategory, LogLevel};
use methub_notify::manager::NotificationManager;
use methub_notify::AlertNotification;
use methub_storage::{AlertHistoryRow, AlertRuleRow, HubStore, NewLogEntry};
use tokio::time::{interval, Duration};

use crate::alerts::provider::StoreStatsProvider;

/// Counts from one evaluation pass.
#[derive(Debug, Default, Clone)]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub fired: usize,
    pub errored: usize,
}

/// Periodic evaluator of user-defined alert rules against the delivery
/// history. One rule's failure never blocks the others: errors go to
/// the log sink and the pass continues.
pub struct AlertScheduler {
    store: Arc<HubStore>,
    notifier: Arc<NotificationManager>,
    provider: StoreStatsProvider,
    tick_secs: u64,
}

impl AlertScheduler {
    pub fn new(
        store: Arc<HubStore>,
        notifier: Arc<NotificationManager>,
        tick_secs: u64,
    ) -> Self {
        let provider = StoreStatsProvider::new(store.clone());
        Self {
            store,
            notifier,
            provider,
            tick_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "Alert evaluator started");

        let mut tick = interval(Duration::from_secs(self.tick_secs.max(1)));
        loop {
            tick.tick().await;
            match self.evaluate_all().await {
                Ok(summary) if summary.fired > 0 || summary.errored > 0 => {
                    tracing::info!(
                        evaluated = summary.evaluated,
                        fired = summary.fired,
                        errored = summary.errored,
                        "Alert evaluation pass finished"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Alert evaluation pass failed");
                }
            }
        }
    }

    /// Evaluate every active rule once.
    pub async fn evaluate_all(&self) -> anyhow::Result<EvaluationSummary> {
        let rules = self.store.list_active_alert_rules().await?;
        let mut summary = EvaluationSummary::default();

        for rule in rules {
            summary.evaluated += 1;
            match self.evaluate_rule(&rule).await {
                Ok(true) => summary.fired += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.errored += 1;
                    tracing::error!(rule_id = %rule.id, error = %e, "Alert rule evaluation failed");
                    let entry = NewLogEntry::new(
                        &rule.workspace_id,
                        LogLevel::Error,
                        LogCategory::Alert,
                        "alert.evaluation_failed",
                        format!("Rule '{}' evaluation failed: {e}", rule.name),
                    )
                    .resource(rule.id.clone());
                    if let Err(log_err) = self.store.append_log(entry).await {
                        tracing::error!(error = %log_err, "Failed to log evaluation failure");
                    }
                }
            }
        }
        Ok(summary)
    }

    async fn evaluate_rule(&self, rule: &AlertRuleRow) -> anyhow::Result<bool> {
        let now = Utc::now();
        if cooldown_active(rule.last_triggered_at, rule.cooldown_minutes, now) {
            return Ok(false);
        }

        let condition = build_condition(&rule.condition_type, &rule.condition_config_json)?;
        let Some(hit) = condition.evaluate(&rule.workspace_id, &self.provider).await? else {
            return Ok(false);
        };

        let history = self
            .store
            .insert_alert_history(&AlertHistoryRow {
                id: methub_common::id::next_id(),
                workspace_id: rule.workspace_id.clone(),
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                status: AlertStatus::Triggered.to_string(),
                condition_snapshot_json: hit.snapshot.to_string(),
                notified_via_json: "[]".to_string(),
                message: hit.message.clone(),
                acknowledged_by: None,
                acknowledged_at: None,
                resolved_at: None,
                triggered_at: now,
            })
            .await?;

        let notification = AlertNotification {
            alert_id: history.id.clone(),
            workspace_id: rule.workspace_id.clone(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            condition_type: rule.condition_type.clone(),
            status: AlertStatus::Triggered.to_string(),
            message: hit.message,
            snapshot: hit.snapshot,
            triggered_at: now,
        };
        let notified_via = self.notifier.dispatch(rule, &notification).await;
        self.store
            .set_alert_notified_via(&history.id, &serde_json::to_string(&notified_via)?)
            .await?;

        self.store.record_rule_trigger(&rule.id, now).await?;
        tracing::info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            notified = ?notified_via,
            "Alert rule fired"
        );
        Ok(true)
    }
}
