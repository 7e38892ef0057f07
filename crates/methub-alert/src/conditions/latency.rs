use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{AlertCondition, ConditionHit, StatsProvider};

/// Fires when the average delivery latency over the window reaches
/// `threshold_ms`. Windows without delivered events never fire.
#[derive(Debug, Deserialize)]
pub struct LatencyThresholdCondition {
    pub threshold_ms: f64,
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,
}

fn default_window_minutes() -> u32 {
    60
}

#[async_trait]
impl AlertCondition for LatencyThresholdCondition {
    fn condition_type(&self) -> &'static str {
        "latency_threshold"
    }

    async fn evaluate(
        &self,
        workspace_id: &str,
        stats: &dyn StatsProvider,
    ) -> Result<Option<ConditionHit>> {
        let window = stats.event_window(workspace_id, self.window_minutes).await?;
        let Some(avg) = window.avg_latency_ms else {
            return Ok(None);
        };
        if avg < self.threshold_ms {
            return Ok(None);
        }

        Ok(Some(ConditionHit {
            snapshot: json!({
                "avg_latency_ms": avg,
                "delivered_events": window.delivered,
                "threshold_ms": self.threshold_ms,
                "window_minutes": self.window_minutes,
            }),
            message: format!(
                "Average delivery latency {:.0}ms over the last {} min",
                avg, self.window_minutes
            ),
        }))
    }
}
