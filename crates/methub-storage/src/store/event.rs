use anyhow::Result;
use chrono::{DateTime, Utc};
use methub_common::types::DeliveryStatus;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::delivery_attempt;
use crate::entities::delivery_event::{self, Column, Entity};
use crate::store::HubStore;

/// Response bodies recorded on attempts are capped at 2000 bytes.
pub const MAX_RESPONSE_BODY_BYTES: usize = 2000;

/// Delivery event data row (from the `delivery_events` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEventRow {
    pub id: String,
    pub workspace_id: String,
    pub route_id: String,
    pub destination_id: String,
    pub source_type: String,
    pub source_event_id: Option<String>,
    pub payload_json: String,
    pub transformed_payload_json: Option<String>,
    pub status: String,
    pub attempts_count: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub metadata_json: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields the receiver provides when enqueuing a new event. The store
/// assigns the id, `pending` status and zeroed counters.
#[derive(Debug, Clone)]
pub struct NewDeliveryEvent {
    pub workspace_id: String,
    pub route_id: String,
    pub destination_id: String,
    pub source_type: String,
    pub source_event_id: Option<String>,
    pub payload_json: String,
    pub transformed_payload_json: Option<String>,
    pub max_attempts: i32,
    pub metadata_json: String,
}

/// Delivery attempt data row. Append-only child of an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRow {
    pub id: String,
    pub workspace_id: String,
    pub event_id: String,
    pub attempt_number: i32,
    pub request_url: String,
    pub request_method: String,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub attempted_at: DateTime<Utc>,
}

/// Conditional patch applied by [`HubStore::transition`]. Outer `None`
/// leaves a column untouched; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub status: Option<DeliveryStatus>,
    pub next_retry_at: Option<Option<DateTime<Utc>>>,
    pub delivered_at: Option<Option<DateTime<Utc>>>,
    pub failed_at: Option<Option<DateTime<Utc>>>,
    pub error_message: Option<Option<String>>,
    pub max_attempts: Option<i32>,
}

/// Filters for the event list API.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub status_eq: Option<String>,
    pub destination_id_eq: Option<String>,
    pub created_gte: Option<DateTime<Utc>>,
}

/// Aggregate counts over a trailing window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryStats {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dlq: u64,
    pub cancelled: u64,
    pub avg_latency_ms: Option<f64>,
}

fn to_row(m: delivery_event::Model) -> DeliveryEventRow {
    DeliveryEventRow {
        id: m.id,
        workspace_id: m.workspace_id,
        route_id: m.route_id,
        destination_id: m.destination_id,
        source_type: m.source_type,
        source_event_id: m.source_event_id,
        payload_json: m.payload_json,
        transformed_payload_json: m.transformed_payload_json,
        status: m.status,
        attempts_count: m.attempts_count,
        max_attempts: m.max_attempts,
        next_retry_at: m.next_retry_at.map(|t| t.with_timezone(&Utc)),
        delivered_at: m.delivered_at.map(|t| t.with_timezone(&Utc)),
        failed_at: m.failed_at.map(|t| t.with_timezone(&Utc)),
        error_message: m.error_message,
        metadata_json: m.metadata_json,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn attempt_to_row(m: delivery_attempt::Model) -> AttemptRow {
    AttemptRow {
        id: m.id,
        workspace_id: m.workspace_id,
        event_id: m.event_id,
        attempt_number: m.attempt_number,
        request_url: m.request_url,
        request_method: m.request_method,
        status_code: m.status_code,
        response_body: m.response_body,
        error_message: m.error_message,
        duration_ms: m.duration_ms,
        attempted_at: m.attempted_at.with_timezone(&Utc),
    }
}

fn truncate_body(body: String) -> String {
    if body.len() <= MAX_RESPONSE_BODY_BYTES {
        return body;
    }
    let mut end = MAX_RESPONSE_BODY_BYTES;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

impl HubStore {
    /// Create a new event in `pending` with `next_retry_at = now`, ready
    /// for immediate pickup.
    pub async fn create_event(&self, new: NewDeliveryEvent) -> Result<DeliveryEventRow> {
        let now = Utc::now().fixed_offset();
        let am = delivery_event::ActiveModel {
            id: Set(methub_common::id::next_id()),
            workspace_id: Set(new.workspace_id),
            route_id: Set(new.route_id),
            destination_id: Set(new.destination_id),
            source_type: Set(new.source_type),
            source_event_id: Set(new.source_event_id),
            payload_json: Set(new.payload_json),
            transformed_payload_json: Set(new.transformed_payload_json),
            status: Set(DeliveryStatus::Pending.to_string()),
            attempts_count: Set(0),
            max_attempts: Set(new.max_attempts),
            next_retry_at: Set(Some(now)),
            delivered_at: Set(None),
            failed_at: Set(None),
            error_message: Set(None),
            metadata_json: Set(new.metadata_json),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<DeliveryEventRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn get_event_in_workspace(
        &self,
        workspace_id: &str,
        id: &str,
    ) -> Result<Option<DeliveryEventRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    /// Conditional state transition keyed on the expected current status.
    /// Returns `false` when zero rows matched, i.e. the event was not in
    /// any of the `from` states (another worker claimed it, or the caller
    /// raced a user action).
    pub async fn transition(
        &self,
        id: &str,
        from: &[DeliveryStatus],
        patch: EventPatch,
    ) -> Result<bool> {
        let mut update = Entity::update_many()
            .filter(Column::Id.eq(id))
            .filter(Column::Status.is_in(from.iter().map(|s| s.to_string())));

        if let Some(status) = patch.status {
            update = update.col_expr(Column::Status, Expr::value(status.to_string()));
        }
        if let Some(v) = patch.next_retry_at {
            update = update.col_expr(Column::NextRetryAt, Expr::value(v.map(|t| t.fixed_offset())));
        }
        if let Some(v) = patch.delivered_at {
            update = update.col_expr(Column::DeliveredAt, Expr::value(v.map(|t| t.fixed_offset())));
        }
        if let Some(v) = patch.failed_at {
            update = update.col_expr(Column::FailedAt, Expr::value(v.map(|t| t.fixed_offset())));
        }
        if let Some(v) = patch.error_message {
            update = update.col_expr(Column::ErrorMessage, Expr::value(v));
        }
        if let Some(v) = patch.max_attempts {
            update = update.col_expr(Column::MaxAttempts, Expr::value(v));
        }
        update = update.col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()));

        let res = update.exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    /// Claim a batch of ready events: `pending`/`failed` whose
    /// `next_retry_at` is due (or null), oldest first. Each claim is an
    /// atomic pending→processing transition that also bumps
    /// `attempts_count`; events lost to a concurrent claimer are skipped.
    pub async fn claim_ready_events(&self, limit: u64) -> Result<Vec<DeliveryEventRow>> {
        let now = Utc::now().fixed_offset();
        let candidates = Entity::find()
            .filter(Column::Status.is_in([
                DeliveryStatus::Pending.to_string(),
                DeliveryStatus::Failed.to_string(),
            ]))
            .filter(
                Condition::any()
                    .add(Column::NextRetryAt.lte(now))
                    .add(Column::NextRetryAt.is_null()),
            )
            .order_by(Column::CreatedAt, Order::Asc)
            .limit(limit)
            .all(self.db())
            .await?;

        let mut claimed = Vec::new();
        for model in candidates {
            if let Some(row) = self.claim_event(&model.id).await? {
                claimed.push(row);
            }
        }
        Ok(claimed)
    }

    /// Claim one specific event if it is ready. Used for the inline first
    /// attempt after enqueue and for user-initiated resends.
    pub async fn claim_event(&self, id: &str) -> Result<Option<DeliveryEventRow>> {
        let now = Utc::now().fixed_offset();
        let res = Entity::update_many()
            .col_expr(
                Column::Status,
                Expr::value(DeliveryStatus::Processing.to_string()),
            )
            .col_expr(
                Column::AttemptsCount,
                Expr::col(Column::AttemptsCount).add(1),
            )
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::Status.is_in([
                DeliveryStatus::Pending.to_string(),
                DeliveryStatus::Failed.to_string(),
            ]))
            .filter(
                Condition::any()
                    .add(Column::NextRetryAt.lte(now))
                    .add(Column::NextRetryAt.is_null()),
            )
            .exec(self.db())
            .await?;

        if res.rows_affected == 0 {
            return Ok(None);
        }
        self.get_event(id).await
    }

    /// Append an attempt record. The response body is truncated to
    /// [`MAX_RESPONSE_BODY_BYTES`].
    pub async fn append_attempt(&self, row: AttemptRow) -> Result<AttemptRow> {
        let am = delivery_attempt::ActiveModel {
            id: Set(methub_common::id::next_id()),
            workspace_id: Set(row.workspace_id),
            event_id: Set(row.event_id),
            attempt_number: Set(row.attempt_number),
            request_url: Set(row.request_url),
            request_method: Set(row.request_method),
            status_code: Set(row.status_code),
            response_body: Set(row.response_body.map(truncate_body)),
            error_message: Set(row.error_message),
            duration_ms: Set(row.duration_ms),
            attempted_at: Set(row.attempted_at.fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        Ok(attempt_to_row(model))
    }

    pub async fn list_attempts(&self, event_id: &str) -> Result<Vec<AttemptRow>> {
        let rows = delivery_attempt::Entity::find()
            .filter(delivery_attempt::Column::EventId.eq(event_id))
            .order_by(delivery_attempt::Column::AttemptNumber, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(attempt_to_row).collect())
    }

    pub async fn list_events(
        &self,
        workspace_id: &str,
        filter: &EventFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<DeliveryEventRow>> {
        let rows = self
            .events_query(workspace_id, filter)
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit)
            .offset(offset)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_events(&self, workspace_id: &str, filter: &EventFilter) -> Result<u64> {
        Ok(self
            .events_query(workspace_id, filter)
            .count(self.db())
            .await?)
    }

    fn events_query(
        &self,
        workspace_id: &str,
        filter: &EventFilter,
    ) -> sea_orm::Select<Entity> {
        let mut q = Entity::find().filter(Column::WorkspaceId.eq(workspace_id));
        if let Some(status) = &filter.status_eq {
            q = q.filter(Column::Status.eq(status));
        }
        if let Some(dest) = &filter.destination_id_eq {
            q = q.filter(Column::DestinationId.eq(dest));
        }
        if let Some(since) = filter.created_gte {
            q = q.filter(Column::CreatedAt.gte(since.fixed_offset()));
        }
        q
    }

    /// Best-effort dedup lookup: has a forwardable event for this route
    /// with the same provider event id been seen since `since`?
    pub async fn find_recent_event_by_source(
        &self,
        route_id: &str,
        source_event_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let model = Entity::find()
            .filter(Column::RouteId.eq(route_id))
            .filter(Column::SourceEventId.eq(source_event_id))
            .filter(Column::CreatedAt.gte(since.fixed_offset()))
            .one(self.db())
            .await?;
        Ok(model.map(|m| m.id))
    }

    /// Aggregate counts and average delivery latency over the last
    /// `hours` hours. `workspace_id = None` spans all workspaces.
    pub async fn stats_by_window(
        &self,
        workspace_id: Option<&str>,
        hours: u32,
    ) -> Result<DeliveryStats> {
        let since = (Utc::now() - chrono::Duration::hours(hours as i64)).fixed_offset();

        let mut q = Entity::find()
            .select_only()
            .column(Column::Status)
            .column_as(Column::Id.count(), "cnt")
            .filter(Column::CreatedAt.gte(since))
            .group_by(Column::Status);
        if let Some(ws) = workspace_id {
            q = q.filter(Column::WorkspaceId.eq(ws));
        }
        let counts: Vec<(String, i64)> = q.into_tuple().all(self.db()).await?;

        let mut stats = DeliveryStats::default();
        for (status, count) in counts {
            let count = count as u64;
            stats.total += count;
            match status.as_str() {
                "pending" => stats.pending = count,
                "processing" => stats.processing = count,
                "delivered" => stats.delivered = count,
                "failed" => stats.failed = count,
                "dlq" => stats.dlq = count,
                "cancelled" => stats.cancelled = count,
                _ => {}
            }
        }

        let mut latency_q = Entity::find()
            .select_only()
            .column(Column::CreatedAt)
            .column(Column::DeliveredAt)
            .filter(Column::Status.eq(DeliveryStatus::Delivered.to_string()))
            .filter(Column::CreatedAt.gte(since));
        if let Some(ws) = workspace_id {
            latency_q = latency_q.filter(Column::WorkspaceId.eq(ws));
        }
        let pairs: Vec<(
            chrono::DateTime<chrono::FixedOffset>,
            Option<chrono::DateTime<chrono::FixedOffset>>,
        )> = latency_q.into_tuple().all(self.db()).await?;

        let latencies: Vec<i64> = pairs
            .iter()
            .filter_map(|(created, delivered)| {
                delivered.map(|d| (d.with_timezone(&Utc) - created.with_timezone(&Utc)).num_milliseconds())
            })
            .collect();
        if !latencies.is_empty() {
            stats.avg_latency_ms =
                Some(latencies.iter().sum::<i64>() as f64 / latencies.len() as f64);
        }

        Ok(stats)
    }
}
