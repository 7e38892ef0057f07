use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::route::{self, Column, Entity};
use crate::store::HubStore;

/// Route data row (from the `routes` table): binds an inbound source kind
/// (and optional channel identifier) to one destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRow {
    pub id: String,
    pub workspace_id: String,
    pub source_type: String,
    pub source_id: Option<String>,
    pub destination_id: String,
    pub mapping_id: Option<String>,
    pub filter_rules_json: Option<String>,
    pub priority: i32,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for a route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteUpdate {
    pub source_type: Option<String>,
    pub source_id: Option<Option<String>>,
    pub destination_id: Option<String>,
    pub mapping_id: Option<Option<String>>,
    pub filter_rules_json: Option<Option<String>>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
}

fn to_row(m: route::Model) -> RouteRow {
    RouteRow {
        id: m.id,
        workspace_id: m.workspace_id,
        source_type: m.source_type,
        source_id: m.source_id,
        destination_id: m.destination_id,
        mapping_id: m.mapping_id,
        filter_rules_json: m.filter_rules_json,
        priority: m.priority,
        is_active: m.is_active,
        deleted_at: m.deleted_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl HubStore {
    pub async fn insert_route(&self, row: &RouteRow) -> Result<RouteRow> {
        let now = Utc::now().fixed_offset();
        let am = route::ActiveModel {
            id: Set(row.id.clone()),
            workspace_id: Set(row.workspace_id.clone()),
            source_type: Set(row.source_type.clone()),
            source_id: Set(row.source_id.clone()),
            destination_id: Set(row.destination_id.clone()),
            mapping_id: Set(row.mapping_id.clone()),
            filter_rules_json: Set(row.filter_rules_json.clone()),
            priority: Set(row.priority),
            is_active: Set(row.is_active),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_route(&self, workspace_id: &str, id: &str) -> Result<Option<RouteRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn list_routes(
        &self,
        workspace_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<RouteRow>> {
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

    pub async fn count_routes(&self, workspace_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .count(self.db())
            .await?)
    }

    /// The route resolver: active, non-deleted routes of the workspace
    /// whose source kind matches and whose `source_id` either equals the
    /// inbound identifier or is absent (catch-all). Highest priority first,
    /// creation time as the tie-breaker.
    pub async fn resolve_routes(
        &self,
        workspace_id: &str,
        source_type: &str,
        source_id: Option<&str>,
    ) -> Result<Vec<RouteRow>> {
        let mut q = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::SourceType.eq(source_type))
            .filter(Column::IsActive.eq(true))
            .filter(Column::DeletedAt.is_null());

        q = match source_id {
            Some(sid) => q.filter(
                Condition::any()
                    .add(Column::SourceId.eq(sid))
                    .add(Column::SourceId.is_null()),
            ),
            None => q.filter(Column::SourceId.is_null()),
        };

        let rows = q
            .order_by(Column::Priority, Order::Desc)
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    /// Resolver variant for the webhook receiver: inbound Meta events are
    /// app-level, so matching spans all workspaces and the created event
    /// inherits each matched route's workspace.
    pub async fn resolve_routes_all_workspaces(
        &self,
        source_type: &str,
        source_id: Option<&str>,
    ) -> Result<Vec<RouteRow>> {
        let mut q = Entity::find()
            .filter(Column::SourceType.eq(source_type))
            .filter(Column::IsActive.eq(true))
            .filter(Column::DeletedAt.is_null());

        q = match source_id {
            Some(sid) => q.filter(
                Condition::any()
                    .add(Column::SourceId.eq(sid))
                    .add(Column::SourceId.is_null()),
            ),
            None => q.filter(Column::SourceId.is_null()),
        };

        let rows = q
            .order_by(Column::Priority, Order::Desc)
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn update_route(
        &self,
        workspace_id: &str,
        id: &str,
        update: &RouteUpdate,
    ) -> Result<Option<RouteRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .one(self.db())
            .await?;
        let Some(m) = model else {
            return Ok(None);
        };

        let mut am: route::ActiveModel = m.into();
        if let Some(v) = &update.source_type {
            am.source_type = Set(v.clone());
        }
        if let Some(v) = &update.source_id {
            am.source_id = Set(v.clone());
        }
        if let Some(v) = &update.destination_id {
            am.destination_id = Set(v.clone());
        }
        if let Some(v) = &update.mapping_id {
            am.mapping_id = Set(v.clone());
        }
        if let Some(v) = &update.filter_rules_json {
            am.filter_rules_json = Set(v.clone());
        }
        if let Some(v) = update.priority {
            am.priority = Set(v);
        }
        if let Some(v) = update.is_active {
            am.is_active = Set(v);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(to_row(updated)))
    }

    pub async fn soft_delete_route(&self, workspace_id: &str, id: &str) -> Result<bool> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .one(self.db())
            .await?;
        let Some(m) = model else {
            return Ok(false);
        };
        let now = Utc::now().fixed_offset();
        let mut am: route::ActiveModel = m.into();
        am.deleted_at = Set(Some(now));
        am.is_active = Set(false);
        am.updated_at = Set(now);
        am.update(self.db()).await?;
        Ok(true)
    }

    /// Cascade for destination deletion: all referencing routes are
    /// deactivated (not deleted). Returns the number of routes touched.
    pub async fn deactivate_routes_for_destination(&self, destination_id: &str) -> Result<u64> {
        let res = Entity::update_many()
            .col_expr(Column::IsActive, Expr::value(false))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::DestinationId.eq(destination_id))
            .filter(Column::IsActive.eq(true))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    /// Cascade for mapping deletion: referencing routes stay active but
    /// lose the mapping reference.
    pub async fn detach_mapping_from_routes(&self, mapping_id: &str) -> Result<u64> {
        let res = Entity::update_many()
            .col_expr(Column::MappingId, Expr::value(Option::<String>::None))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::MappingId.eq(mapping_id))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }
}
