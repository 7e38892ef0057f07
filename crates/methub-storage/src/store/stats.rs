use anyhow::Result;
use chrono::{DateTime, Utc};
use methub_common::types::DeliveryStatus;
use sea_orm::{ColumnTrait, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::entities::delivery_attempt;
use crate::entities::delivery_event::{self, Column};
use crate::store::HubStore;

/// Window aggregates the alert evaluator reads. Latency is the mean of
/// `delivered_at - created_at` over delivered events in the window.
#[derive(Debug, Clone, Default)]
pub struct EventWindowStats {
    pub total: u64,
    pub failed_or_dlq: u64,
    pub delivered: u64,
    pub avg_latency_ms: Option<f64>,
}

impl HubStore {
    /// Counts over events created in the last `minutes` minutes of one
    /// workspace.
    pub async fn event_window_stats(
        &self,
        workspace_id: &str,
        minutes: u32,
    ) -> Result<EventWindowStats> {
        let since = (Utc::now() - chrono::Duration::minutes(minutes as i64)).fixed_offset();

        let counts: Vec<(String, i64)> = delivery_event::Entity::find()
            .select_only()
            .column(Column::Status)
            .column_as(Column::Id.count(), "cnt")
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::CreatedAt.gte(since))
            .group_by(Column::Status)
            .into_tuple()
            .all(self.db())
            .await?;

        let mut stats = EventWindowStats::default();
        for (status, count) in counts {
            let count = count as u64;
            stats.total += count;
            match status.as_str() {
                "failed" | "dlq" => stats.failed_or_dlq += count,
                "delivered" => stats.delivered += count,
                _ => {}
            }
        }

        let pairs: Vec<(
            DateTime<chrono::FixedOffset>,
            Option<DateTime<chrono::FixedOffset>>,
        )> = delivery_event::Entity::find()
            .select_only()
            .column(Column::CreatedAt)
            .column(Column::DeliveredAt)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::Status.eq(DeliveryStatus::Delivered.to_string()))
            .filter(Column::CreatedAt.gte(since))
            .into_tuple()
            .all(self.db())
            .await?;

        let latencies: Vec<i64> = pairs
            .iter()
            .filter_map(|(created, delivered)| {
                delivered.map(|d| {
                    (d.with_timezone(&Utc) - created.with_timezone(&Utc)).num_milliseconds()
                })
            })
            .collect();
        if !latencies.is_empty() {
            stats.avg_latency_ms =
                Some(latencies.iter().sum::<i64>() as f64 / latencies.len() as f64);
        }

        Ok(stats)
    }

    /// Events currently sitting in the dead-letter queue.
    pub async fn dlq_count(&self, workspace_id: &str) -> Result<u64> {
        Ok(delivery_event::Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::Status.eq(DeliveryStatus::Dlq.to_string()))
            .count(self.db())
            .await?)
    }

    /// Events created in the last `minutes` minutes, any status.
    pub async fn events_created_count(&self, workspace_id: &str, minutes: u32) -> Result<u64> {
        let since = (Utc::now() - chrono::Duration::minutes(minutes as i64)).fixed_offset();
        Ok(delivery_event::Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::CreatedAt.gte(since))
            .count(self.db())
            .await?)
    }

    /// Outcome of the most recent `limit` attempts in the workspace,
    /// newest first. `true` means the attempt got a 2xx.
    pub async fn recent_attempt_outcomes(
        &self,
        workspace_id: &str,
        limit: u32,
    ) -> Result<Vec<bool>> {
        let codes: Vec<Option<i32>> = delivery_attempt::Entity::find()
            .select_only()
            .column(delivery_attempt::Column::StatusCode)
            .filter(delivery_attempt::Column::WorkspaceId.eq(workspace_id))
            .order_by(delivery_attempt::Column::AttemptedAt, Order::Desc)
            .limit(limit as u64)
            .into_tuple()
            .all(self.db())
            .await?;

        Ok(codes
            .into_iter()
            .map(|code| matches!(code, Some(c) if (200..300).contains(&c)))
            .collect())
    }
}
