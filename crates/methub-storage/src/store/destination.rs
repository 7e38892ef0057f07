use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::destination::{self, Column, Entity};
use crate::store::HubStore;

/// Destination data row (from the `destinations` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationRow {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers_json: String,
    pub auth_type: String,
    pub auth_config_json: String,
    pub timeout_ms: i32,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for a destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers_json: Option<String>,
    pub auth_type: Option<String>,
    pub auth_config_json: Option<String>,
    pub timeout_ms: Option<i32>,
    pub is_active: Option<bool>,
}

fn to_row(m: destination::Model) -> DestinationRow {
    DestinationRow {
        id: m.id,
        workspace_id: m.workspace_id,
        name: m.name,
        url: m.url,
        method: m.method,
        headers_json: m.headers_json,
        auth_type: m.auth_type,
        auth_config_json: m.auth_config_json,
        timeout_ms: m.timeout_ms,
        is_active: m.is_active,
        deleted_at: m.deleted_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl HubStore {
    pub async fn insert_destination(&self, row: &DestinationRow) -> Result<DestinationRow> {
        let now = Utc::now().fixed_offset();
        let am = destination::ActiveModel {
            id: Set(row.id.clone()),
            workspace_id: Set(row.workspace_id.clone()),
            name: Set(row.name.clone()),
            url: Set(row.url.clone()),
            method: Set(row.method.clone()),
            headers_json: Set(row.headers_json.clone()),
            auth_type: Set(row.auth_type.clone()),
            auth_config_json: Set(row.auth_config_json.clone()),
            timeout_ms: Set(row.timeout_ms),
            is_active: Set(row.is_active),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    /// Fetch by id within a workspace; soft-deleted rows are not returned.
    pub async fn get_destination(
        &self,
        workspace_id: &str,
        id: &str,
    ) -> Result<Option<DestinationRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    /// Fetch by id regardless of workspace. Used by the delivery worker,
    /// which operates on already-scoped events.
    pub async fn get_destination_by_id(&self, id: &str) -> Result<Option<DestinationRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn list_destinations(
        &self,
        workspace_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<DestinationRow>> {
        let rows = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit)
            .offset(offset)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn count_destinations(&self, workspace_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .count(self.db())
            .await?)
    }

    pub async fn update_destination(
        &self,
        workspace_id: &str,
        id: &str,
        update: &DestinationUpdate,
    ) -> Result<Option<DestinationRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .one(self.db())
            .await?;
        let Some(m) = model else {
            return Ok(None);
        };

        let mut am: destination::ActiveModel = m.into();
        if let Some(v) = &update.name {
            am.name = Set(v.clone());
        }
        if let Some(v) = &update.url {
            am.url = Set(v.clone());
        }
        if let Some(v) = &update.method {
            am.method = Set(v.clone());
        }
        if let Some(v) = &update.headers_json {
            am.headers_json = Set(v.clone());
        }
        if let Some(v) = &update.auth_type {
            am.auth_type = Set(v.clone());
        }
        if let Some(v) = &update.auth_config_json {
            am.auth_config_json = Set(v.clone());
        }
        if let Some(v) = update.timeout_ms {
            am.timeout_ms = Set(v);
        }
        if let Some(v) = update.is_active {
            am.is_active = Set(v);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(to_row(updated)))
    }

    /// Soft delete. Referencing routes are deactivated by the caller via
    /// [`HubStore::deactivate_routes_for_destination`].
    pub async fn soft_delete_destination(&self, workspace_id: &str, id: &str) -> Result<bool> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .one(self.db())
            .await?;
        let Some(m) = model else {
            return Ok(false);
        };
        let now = Utc::now().fixed_offset();
        let mut am: destination::ActiveModel = m.into();
        am.deleted_at = Set(Some(now));
        am.is_active = Set(false);
        am.updated_at = Set(now);
        am.update(self.db()).await?;
        Ok(true)
    }
}
