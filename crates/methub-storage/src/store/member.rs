use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};

use crate::entities::workspace_member::{self, Column, Entity};
use crate::store::HubStore;

/// Membership rows are written by the external auth/invite system; the
/// core only checks them. `add_member` exists for seeding and tests.
impl HubStore {
    pub async fn is_member(&self, workspace_id: &str, user_id: &str) -> Result<bool> {
        let found = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::UserId.eq(user_id))
            .one(self.db())
            .await?;
        Ok(found.is_some())
    }

    pub async fn add_member(&self, workspace_id: &str, user_id: &str, role: &str) -> Result<()> {
        let am = workspace_member::ActiveModel {
            id: Set(methub_common::id::next_id()),
            workspace_id: Set(workspace_id.to_string()),
            user_id: Set(user_id.to_string()),
            role: Set(role.to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        };
        am.insert(self.db()).await?;
        Ok(())
    }
}
