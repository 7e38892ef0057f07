use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{AlertCondition, ConditionHit, StatsProvider};

/// Fires when the last `threshold` delivery attempts in the workspace all
/// failed, regardless of destination. Fewer recorded attempts than the
/// threshold never fire.
#[derive(Debug, Deserialize)]
pub struct ConsecutiveFailsCondition {
    pub threshold: u32,
}

#[async_trait]
impl AlertCondition for ConsecutiveFailsCondition {
    fn condition_type(&self) -> &'static str {
        "consecutive_fails"
    }

    async fn evaluate(
        &self,
        workspace_id: &str,
        stats: &dyn StatsProvider,
    ) -> Result<Option<ConditionHit>> {
        if self.threshold == 0 {
            return Ok(None);
        }
        let outcomes = stats
            .recent_attempt_outcomes(workspace_id, self.threshold)
            .await?;
        if (outcomes.len() as u32) < self.threshold || outcomes.iter().any(|ok| *ok) {
            return Ok(None);
        }

        Ok(Some(ConditionHit {
            snapshot: json!({
                "consecutive_failures": outcomes.len(),
                "threshold": self.threshold,
            }),
            message: format!("Last {} delivery attempts all failed", outcomes.len()),
        }))
    }
}
