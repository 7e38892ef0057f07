use anyhow::Result;
use chrono::{DateTime, Utc};
use methub_common::types::{LogCategory, LogLevel};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::event_log::{self, Column, Entity};
use crate::store::HubStore;

/// Structured log row (from the `event_logs` table). Append-only; the
/// core offers no deletion path — retention is a deployment concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogRow {
    pub id: String,
    pub workspace_id: String,
    pub level: String,
    pub category: String,
    pub action: String,
    pub message: String,
    pub resource_id: Option<String>,
    pub metadata_json: String,
    pub duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Write-side input for one log row.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub workspace_id: String,
    pub level: LogLevel,
    pub category: LogCategory,
    pub action: String,
    pub message: String,
    pub resource_id: Option<String>,
    pub metadata: serde_json::Value,
    pub duration_ms: Option<i64>,
}

impl NewLogEntry {
    pub fn new(
        workspace_id: &str,
        level: LogLevel,
        category: LogCategory,
        action: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            level,
            category,
            action: action.to_string(),
            message: message.into(),
            resource_id: None,
            metadata: serde_json::Value::Object(Default::default()),
            duration_ms: None,
        }
    }

    pub fn resource(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn duration(mut self, ms: i64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}

/// Read-side filters.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub level_eq: Option<String>,
    pub category_eq: Option<String>,
    pub message_contains: Option<String>,
}

fn to_row(m: event_log::Model) -> EventLogRow {
    EventLogRow {
        id: m.id,
        workspace_id: m.workspace_id,
        level: m.level,
        category: m.category,
        action: m.action,
        message: m.message,
        resource_id: m.resource_id,
        metadata_json: m.metadata_json,
        duration_ms: m.duration_ms,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

impl HubStore {
    pub async fn append_log(&self, entry: NewLogEntry) -> Result<EventLogRow> {
        let am = event_log::ActiveModel {
            id: Set(methub_common::id::next_id()),
            workspace_id: Set(entry.workspace_id),
            level: Set(entry.level.to_string()),
            category: Set(entry.category.to_string()),
            action: Set(entry.action),
            message: Set(entry.message),
            resource_id: Set(entry.resource_id),
            metadata_json: Set(entry.metadata.to_string()),
            duration_ms: Set(entry.duration_ms),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn list_logs(
        &self,
        workspace_id: &str,
        filter: &LogFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<EventLogRow>> {
        let rows = self
            .logs_query(workspace_id, filter)
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit)
            .offset(offset)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_logs(&self, workspace_id: &str, filter: &LogFilter) -> Result<u64> {
        Ok(self
            .logs_query(workspace_id, filter)
            .count(self.db())
            .await?)
    }

    fn logs_query(&self, workspace_id: &str, filter: &LogFilter) -> sea_orm::Select<Entity> {
        let mut q = Entity::find().filter(Column::WorkspaceId.eq(workspace_id));
        if let Some(level) = &filter.level_eq {
            q = q.filter(Column::Level.eq(level));
        }
        if let Some(category) = &filter.category_eq {
            q = q.filter(Column::Category.eq(category));
        }
        if let Some(needle) = &filter.message_contains {
            q = q.filter(Column::Message.contains(needle));
        }
        q
    }
}
