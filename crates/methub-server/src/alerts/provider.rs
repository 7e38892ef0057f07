use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use methub_alert::{EventWindow, StatsProvider};
use methub_storage::HubStore;

/// [`StatsProvider`] backed by the event store.
pub struct StoreStatsProvider {
    store: Arc<HubStore>,
}

impl StoreStatsProvider {
    pub fn new(store: Arc<HubStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StatsProvider for StoreStatsProvider {
    async fn event_window(&self, workspace_id: &str, minutes: u32) -> Result<EventWindow> {
        let stats = self.store.event_window_stats(workspace_id, minutes).await?;
        Ok(EventWindow {
            total: stats.total,
            failed_or_dlq: stats.failed_or_dlq,
            delivered: stats.delivered,
            avg_latency_ms: stats.avg_latency_ms,
        })
    }

    async fn dlq_count(&self, workspace_id: &str) -> Result<u64> {
        self.store.dlq_count(workspace_id).await
    }

    async fn events_created(&self, workspace_id: &str, minutes: u32) -> Result<u64> {
        self.store.events_created_count(workspace_id, minutes).await
    }

    async fn recent_attempt_outcomes(&self, workspace_id: &str, limit: u32) -> Result<Vec<bool>> {
        self.store.recent_attempt_outcomes(workspace_id, limit).await
    }
}
