use anyhow::Result;
use async_trait::async_trait;

use crate::{AlertCondition, ConditionHit, StatsProvider};

/// Reserved condition type. Accepts any configuration and never fires.
#[derive(Debug, Default)]
pub struct CustomCondition;

#[async_trait]
impl AlertCondition for CustomCondition {
    fn condition_type(&self) -> &'static str {
        "custom"
    }

    async fn evaluate(
        &self,
        _workspace_id: &str,
        _stats: &dyn StatsProvider,
    ) -> Result<Option<ConditionHit>> {
        Ok(None)
    }
}
