use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{AlertCondition, ConditionHit, StatsProvider};

/// Fires when the dead-letter queue holds at least `threshold` events.
#[derive(Debug, Deserialize)]
pub struct DlqThresholdCondition {
    pub threshold: u64,
}

#[async_trait]
impl AlertCondition for DlqThresholdCondition {
    fn condition_type(&self) -> &'static str {
        "dlq_threshold"
    }

    async fn evaluate(
        &self,
        workspace_id: &str,
        stats: &dyn StatsProvider,
    ) -> Result<Option<ConditionHit>> {
        let count = stats.dlq_count(workspace_id).await?;
        if count < self.threshold {
            return Ok(None);
        }

        Ok(Some(ConditionHit {
            snapshot: json!({
                "dlq_count": count,
                "threshold": self.threshold,
            }),
            message: format!("{count} events in the dead-letter queue"),
        }))
    }
}
