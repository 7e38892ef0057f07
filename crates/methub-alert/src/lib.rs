//! Alert rule evaluation over the delivery pipeline's recent history.
//!
//! Each rule type is an [`AlertCondition`] that reads window aggregates
//! through a [`StatsProvider`] and reports a [`ConditionHit`] with the
//! measured values when its predicate crosses the configured threshold.
//! Cooldown handling and rule parsing live in [`engine`]; the periodic
//! tick that drives evaluation belongs to the server.

pub mod conditions;
pub mod engine;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Aggregates over events created in a trailing window.
#[derive(Debug, Clone, Default)]
pub struct EventWindow {
    pub total: u64,
    pub failed_or_dlq: u64,
    pub delivered: u64,
    /// Mean of `delivered_at - created_at` over delivered events.
    pub avg_latency_ms: Option<f64>,
}

/// Read access to delivery history, implemented by the server on top of
/// the event store. Keeping the conditions behind this seam makes them
/// testable without a database.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    async fn event_window(&self, workspace_id: &str, minutes: u32) -> Result<EventWindow>;

    async fn dlq_count(&self, workspace_id: &str) -> Result<u64>;

    async fn events_created(&self, workspace_id: &str, minutes: u32) -> Result<u64>;

    /// Outcomes of the most recent attempts, newest first; `true` = 2xx.
    async fn recent_attempt_outcomes(&self, workspace_id: &str, limit: u32) -> Result<Vec<bool>>;
}

/// A condition that crossed its threshold: the numeric values measured
/// at evaluation time plus a human-readable summary.
#[derive(Debug, Clone)]
pub struct ConditionHit {
    pub snapshot: Value,
    pub message: String,
}

/// One alert rule condition, built from the rule's `condition_config`.
#[async_trait]
pub trait AlertCondition: Send + Sync {
    fn condition_type(&self) -> &'static str;

    /// Returns `Some` when the condition currently holds.
    async fn evaluate(
        &self,
        workspace_id: &str,
        stats: &dyn StatsProvider,
    ) -> Result<Option<ConditionHit>>;
}
