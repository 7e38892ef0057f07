use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{AlertCondition, ConditionHit, StatsProvider};

/// Fires when no events at all were created in the last `minutes`
/// minutes — a silent integration usually means a broken webhook
/// subscription upstream.
#[derive(Debug, Deserialize)]
pub struct NoEventsCondition {
    pub minutes: u32,
}

#[async_trait]
impl AlertCondition for NoEventsCondition {
    fn condition_type(&self) -> &'static str {
        "no_events"
    }

    async fn evaluate(
        &self,
        workspace_id: &str,
        stats: &dyn StatsProvider,
    ) -> Result<Option<ConditionHit>> {
        let count = stats.events_created(workspace_id, self.minutes).await?;
        if count > 0 {
            return Ok(None);
        }

        Ok(Some(ConditionHit {
            snapshot: json!({
                "events_created": 0,
                "window_minutes": self.minutes,
            }),
            message: format!("No events received in the last {} min", self.minutes),
        }))
    }
}
