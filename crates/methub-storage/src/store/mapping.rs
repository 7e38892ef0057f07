use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::mapping::{self, Column, Entity};
use crate::store::HubStore;

/// Mapping data row (from the `mappings` table). `rules_json` holds the
/// serialized rule list; it is parsed into a mapping definition at the
/// point of use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRow {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub mode: String,
    pub rules_json: String,
    pub template: Option<String>,
    pub static_fields_json: String,
    pub pass_through: bool,
    pub source_type: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: mapping::Model) -> MappingRow {
    MappingRow {
        id: m.id,
        workspace_id: m.workspace_id,
        name: m.name,
        mode: m.mode,
        rules_json: m.rules_json,
        template: m.template,
        static_fields_json: m.static_fields_json,
        pass_through: m.pass_through,
        source_type: m.source_type,
        deleted_at: m.deleted_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl HubStore {
    pub async fn insert_mapping(&self, row: &MappingRow) -> Result<MappingRow> {
        let now = Utc::now().fixed_offset();
        let am = mapping::ActiveModel {
            id: Set(row.id.clone()),
            workspace_id: Set(row.workspace_id.clone()),
            name: Set(row.name.clone()),
            mode: Set(row.mode.clone()),
            rules_json: Set(row.rules_json.clone()),
            template: Set(row.template.clone()),
            static_fields_json: Set(row.static_fields_json.clone()),
            pass_through: Set(row.pass_through),
            source_type: Set(row.source_type.clone()),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_mapping(&self, workspace_id: &str, id: &str) -> Result<Option<MappingRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn list_mappings(
        &self,
        workspace_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<MappingRow>> {
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

    pub async fn count_mappings(&self, workspace_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .count(self.db())
            .await?)
    }

    /// Soft delete. Routes referencing the mapping are detached by the
    /// caller via [`HubStore::detach_mapping_from_routes`] and fall back to
    /// pass-through behaviour.
    pub async fn soft_delete_mapping(&self, workspace_id: &str, id: &str) -> Result<bool> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::DeletedAt.is_null())
            .one(self.db())
            .await?;
        let Some(m) = model else {
            return Ok(false);
        };
        let now = Utc::now().fixed_offset();
        let mut am: mapping::ActiveModel = m.into();
        am.deleted_at = Set(Some(now));
        am.updated_at = Set(now);
        am.update(self.db()).await?;
        Ok(true)
    }
}
