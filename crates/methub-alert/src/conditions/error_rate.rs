use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{AlertCondition, ConditionHit, StatsProvider};

/// Fires when the fraction of failed/dead-lettered events in the window
/// reaches `threshold_pct`. Requires at least one event so an idle
/// workspace never alerts.
#[derive(Debug, Deserialize)]
pub struct ErrorRateCondition {
    pub threshold_pct: f64,
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,
}

fn default_window_minutes() -> u32 {
    60
}

#[async_trait]
impl AlertCondition for ErrorRateCondition {
    fn condition_type(&self) -> &'static str {
        "error_rate"
    }

    async fn evaluate(
        &self,
        workspace_id: &str,
        stats: &dyn StatsProvider,
    ) -> Result<Option<ConditionHit>> {
        let window = stats.event_window(workspace_id, self.window_minutes).await?;
        if window.total == 0 {
            return Ok(None);
        }

        let rate_pct = window.failed_or_dlq as f64 / window.total as f64 * 100.0;
        if rate_pct < self.threshold_pct {
            return Ok(None);
        }

        Ok(Some(ConditionHit {
            snapshot: json!({
                "error_rate_pct": rate_pct,
                "failed_events": window.failed_or_dlq,
                "total_events": window.total,
                "threshold_pct": self.threshold_pct,
                "window_minutes": self.window_minutes,
            }),
            message: format!(
                "Error rate {:.1}% over the last {} min ({} of {} events failed)",
                rate_pct, self.window_minutes, window.failed_or_dlq, window.total
            ),
        }))
    }
}
