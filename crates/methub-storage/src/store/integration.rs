use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::entities::integration::{self, Column, Entity};
use crate::entities::meta_resource;
use crate::store::HubStore;

/// Stored result of the OAuth dance for one workspace + provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationRow {
    pub id: String,
    pub workspace_id: String,
    pub provider: String,
    pub access_token: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub scopes_json: String,
    pub connected_by: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One provider-side object enumerated during resource sync: a WhatsApp
/// number, ad account, lead form or page. Routes pick `source_id` values
/// from this inventory; page rows carry the page access token in their
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaResourceRow {
    pub id: String,
    pub workspace_id: String,
    pub integration_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub name: String,
    pub metadata_json: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: integration::Model) -> IntegrationRow {
    IntegrationRow {
        id: m.id,
        workspace_id: m.workspace_id,
        provider: m.provider,
        access_token: m.access_token,
        token_expires_at: m.token_expires_at.map(|t| t.with_timezone(&Utc)),
        scopes_json: m.scopes_json,
        connected_by: m.connected_by,
        last_synced_at: m.last_synced_at.map(|t| t.with_timezone(&Utc)),
        is_active: m.is_active,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn to_resource_row(m: meta_resource::Model) -> MetaResourceRow {
    MetaResourceRow {
        id: m.id,
        workspace_id: m.workspace_id,
        integration_id: m.integration_id,
        resource_type: m.resource_type,
        resource_id: m.resource_id,
        name: m.name,
        metadata_json: m.metadata_json,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl HubStore {
    /// Insert or refresh the integration for `(workspace, provider)`.
    /// A repeat OAuth dance replaces the stored token and scopes.
    pub async fn upsert_integration(&self, row: &IntegrationRow) -> Result<IntegrationRow> {
        let now = Utc::now().fixed_offset();
        let existing = Entity::find()
            .filter(Column::WorkspaceId.eq(&row.workspace_id))
            .filter(Column::Provider.eq(&row.provider))
            .one(self.db())
            .await?;

        match existing {
            Some(m) => {
                let mut am: integration::ActiveModel = m.into();
                am.access_token = Set(row.access_token.clone());
                am.token_expires_at = Set(row.token_expires_at.map(|t| t.fixed_offset()));
                am.scopes_json = Set(row.scopes_json.clone());
                am.connected_by = Set(row.connected_by.clone());
                am.is_active = Set(true);
                am.updated_at = Set(now);
                let updated = am.update(self.db()).await?;
                Ok(to_row(updated))
            }
            None => {
                let am = integration::ActiveModel {
                    id: Set(row.id.clone()),
                    workspace_id: Set(row.workspace_id.clone()),
                    provider: Set(row.provider.clone()),
                    access_token: Set(row.access_token.clone()),
                    token_expires_at: Set(row.token_expires_at.map(|t| t.fixed_offset())),
                    scopes_json: Set(row.scopes_json.clone()),
                    connected_by: Set(row.connected_by.clone()),
                    last_synced_at: Set(None),
                    is_active: Set(true),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                let model = am.insert(self.db()).await?;
                Ok(to_row(model))
            }
        }
    }

    pub async fn get_active_integration(
        &self,
        workspace_id: &str,
        provider: &str,
    ) -> Result<Option<IntegrationRow>> {
        let model = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::Provider.eq(provider))
            .filter(Column::IsActive.eq(true))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn mark_integration_synced(&self, id: &str) -> Result<()> {
        if let Some(m) = Entity::find_by_id(id).one(self.db()).await? {
            let now = Utc::now().fixed_offset();
            let mut am: integration::ActiveModel = m.into();
            am.last_synced_at = Set(Some(now));
            am.updated_at = Set(now);
            am.update(self.db()).await?;
        }
        Ok(())
    }

    /// Replace the enumerated inventory of one integration.
    pub async fn replace_meta_resources(
        &self,
        integration_id: &str,
        rows: &[MetaResourceRow],
    ) -> Result<usize> {
        meta_resource::Entity::delete_many()
            .filter(meta_resource::Column::IntegrationId.eq(integration_id))
            .exec(self.db())
            .await?;

        let now = Utc::now().fixed_offset();
        for row in rows {
            let am = meta_resource::ActiveModel {
                id: Set(row.id.clone()),
                workspace_id: Set(row.workspace_id.clone()),
                integration_id: Set(row.integration_id.clone()),
                resource_type: Set(row.resource_type.clone()),
                resource_id: Set(row.resource_id.clone()),
                name: Set(row.name.clone()),
                metadata_json: Set(row.metadata_json.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            am.insert(self.db()).await?;
        }
        Ok(rows.len())
    }

    pub async fn list_meta_resources(
        &self,
        workspace_id: &str,
        resource_type: Option<&str>,
    ) -> Result<Vec<MetaResourceRow>> {
        let mut q =
            meta_resource::Entity::find().filter(meta_resource::Column::WorkspaceId.eq(workspace_id));
        if let Some(rt) = resource_type {
            q = q.filter(meta_resource::Column::ResourceType.eq(rt));
        }
        let rows = q
            .order_by(meta_resource::Column::Name, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_resource_row).collect())
    }

    /// Page access token for lead enrichment, when one was captured during
    /// resource sync.
    pub async fn get_page_access_token(&self, workspace_id: &str) -> Result<Option<String>> {
        let pages = self.list_meta_resources(workspace_id, Some("page")).await?;
        for page in pages {
            if let Ok(meta) = serde_json::from_str::<serde_json::Value>(&page.metadata_json) {
                if let Some(token) = meta.get("access_token").and_then(|v| v.as_str()) {
                    return Ok(Some(token.to_string()));
                }
            }
        }
        Ok(None)
    }
}
