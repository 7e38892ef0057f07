use anyhow::Result;
use chrono::{DateTime, Utc};
use methub_common::types::AlertStatus;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::alert_history;
use crate::entities::alert_rule::{self, Column, Entity};
use crate::store::HubStore;

/// Alert rule data row (from the `alert_rules` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleRow {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub condition_type: String,
    pub condition_config_json: String,
    pub notify_channels_json: String,
    pub notify_config_json: String,
    pub cooldown_minutes: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub trigger_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for an alert rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertRuleUpdate {
    pub name: Option<String>,
    pub condition_config_json: Option<String>,
    pub notify_channels_json: Option<String>,
    pub notify_config_json: Option<String>,
    pub cooldown_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

/// One firing of a rule (from the `alert_history` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistoryRow {
    pub id: String,
    pub workspace_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub status: String,
    pub condition_snapshot_json: String,
    pub notified_via_json: String,
    pub message: String,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub triggered_at: DateTime<Utc>,
}

fn to_rule_row(m: alert_rule::Model) -> AlertRuleRow {
    AlertRuleRow {
        id: m.id,
        workspace_id: m.workspace_id,
        name: m.name,
        condition_type: m.condition_type,
        condition_config_json: m.condition_config_json,
        notify_channels_json: m.notify_channels_json,
        notify_config_json: m.notify_config_json,
        cooldown_minutes: m.cooldown_minutes,
        last_triggered_at: m.last_triggered_at.map(|t| t.with_timezone(&Utc)),
        trigger_count: m.trigger_count,
        is_active: m.is_active,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

fn to_history_row(m: alert_history::Model) -> AlertHistoryRow {
    AlertHistoryRow {
        id: m.id,
        workspace_id: m.workspace_id,
        rule_id: m.rule_id,
        rule_name: m.rule_name,
        status: m.status,
        condition_snapshot_json: m.condition_snapshot_json,
        notified_via_json: m.notified_via_json,
        message: m.message,
        acknowledged_by: m.acknowledged_by,
        acknowledged_at: m.acknowledged_at.map(|t| t.with_timezone(&Utc)),
        resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
        triggered_at: m.triggered_at.with_timezone(&Utc),
    }
}

impl HubStore {
    pub async fn insert_alert_rule(&self, row: &AlertRuleRow) -> Result<AlertRuleRow> {
        let now = Utc::now().fixed_offset();
        let am = alert_rule::ActiveModel {
            id: Set(row.id.clone()),
            workspace_id: Set(row.workspace_id.clone()),
            name: Set(row.name.clone()),
            condition_type: Set(row.condition_type.clone()),
            condition_config_json: Set(row.condition_config_json.clone()),
            notify_channels_json: Set(row.notify_channels_json.clone()),
            notify_config_json: Set(row.notify_config_json.clone()),
            cooldown_minutes: Set(row.cooldown_minutes),
            last_triggered_at: Set(None),
            trigger_count: Set(0),
            is_active: Set(row.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_rule_row(model))
    }

    pub async fn get_alert_rule(
        &self,
        workspace_id: &str,
        id: &str,
    ) -> Result<Option<AlertRuleRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .one(self.db())
            .await?;
        Ok(model.map(to_rule_row))
    }

    pub async fn list_alert_rules(
        &self,
        workspace_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<AlertRuleRow>> {
        let rows = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit)
            .offset(offset)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_rule_row).collect())
    }

    pub async fn count_alert_rules(&self, workspace_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .count(self.db())
            .await?)
    }

    /// Active rules across all workspaces, for the evaluator tick.
    pub async fn list_active_alert_rules(&self) -> Result<Vec<AlertRuleRow>> {
        let rows = Entity::find()
            .filter(Column::IsActive.eq(true))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_rule_row).collect())
    }

    pub async fn update_alert_rule(
        &self,
        workspace_id: &str,
        id: &str,
        update: &AlertRuleUpdate,
    ) -> Result<Option<AlertRuleRow>> {
        let model = Entity::find_by_id(id)
            .filter(Column::WorkspaceId.eq(workspace_id))
            .one(self.db())
            .await?;
        let Some(m) = model else {
            return Ok(None);
        };

        let mut am: alert_rule::ActiveModel = m.into();
        if let Some(v) = &update.name {
            am.name = Set(v.clone());
        }
        if let Some(v) = &update.condition_config_json {
            am.condition_config_json = Set(v.clone());
        }
        if let Some(v) = &update.notify_channels_json {
            am.notify_channels_json = Set(v.clone());
        }
        if let Some(v) = &update.notify_config_json {
            am.notify_config_json = Set(v.clone());
        }
        if let Some(v) = update.cooldown_minutes {
            am.cooldown_minutes = Set(v);
        }
        if let Some(v) = update.is_active {
            am.is_active = Set(v);
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        Ok(Some(to_rule_row(updated)))
    }

    pub async fn delete_alert_rule(&self, workspace_id: &str, id: &str) -> Result<bool> {
        let res = Entity::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::WorkspaceId.eq(workspace_id))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }

    /// Bump `trigger_count` and stamp `last_triggered_at` after a firing.
    pub async fn record_rule_trigger(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        Entity::update_many()
            .col_expr(
                Column::TriggerCount,
                Expr::col(Column::TriggerCount).add(1),
            )
            .col_expr(Column::LastTriggeredAt, Expr::value(Some(at.fixed_offset())))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(Column::Id.eq(id))
            .exec(self.db())
            .await?;
        Ok(())
    }

    // ---- alert history ----

    pub async fn insert_alert_history(&self, row: &AlertHistoryRow) -> Result<AlertHistoryRow> {
        let am = alert_history::ActiveModel {
            id: Set(row.id.clone()),
            workspace_id: Set(row.workspace_id.clone()),
            rule_id: Set(row.rule_id.clone()),
            rule_name: Set(row.rule_name.clone()),
            status: Set(row.status.clone()),
            condition_snapshot_json: Set(row.condition_snapshot_json.clone()),
            notified_via_json: Set(row.notified_via_json.clone()),
            message: Set(row.message.clone()),
            acknowledged_by: Set(None),
            acknowledged_at: Set(None),
            resolved_at: Set(None),
            triggered_at: Set(row.triggered_at.fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_history_row(model))
    }

    /// Lookup by id alone; the API resolves the workspace from the row
    /// and then checks the caller's membership against it.
    pub async fn get_alert_history_by_id(&self, id: &str) -> Result<Option<AlertHistoryRow>> {
        let model = alert_history::Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_history_row))
    }

    pub async fn get_alert_history(
        &self,
        workspace_id: &str,
        id: &str,
    ) -> Result<Option<AlertHistoryRow>> {
        let model = alert_history::Entity::find_by_id(id)
            .filter(alert_history::Column::WorkspaceId.eq(workspace_id))
            .one(self.db())
            .await?;
        Ok(model.map(to_history_row))
    }

    pub async fn list_alert_history(
        &self,
        workspace_id: &str,
        rule_id: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<AlertHistoryRow>> {
        let mut q =
            alert_history::Entity::find().filter(alert_history::Column::WorkspaceId.eq(workspace_id));
        if let Some(rule) = rule_id {
            q = q.filter(alert_history::Column::RuleId.eq(rule));
        }
        let rows = q
            .order_by(alert_history::Column::TriggeredAt, Order::Desc)
            .limit(limit)
            .offset(offset)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_history_row).collect())
    }

    /// Record which channels accepted the notification for a firing.
    pub async fn set_alert_notified_via(&self, id: &str, notified_via_json: &str) -> Result<()> {
        alert_history::Entity::update_many()
            .col_expr(
                alert_history::Column::NotifiedViaJson,
                Expr::value(notified_via_json),
            )
            .filter(alert_history::Column::Id.eq(id))
            .exec(self.db())
            .await?;
        Ok(())
    }

    /// triggered → acknowledged. Conditional on the current status, so a
    /// double-acknowledge reports `false`.
    pub async fn acknowledge_alert(
        &self,
        workspace_id: &str,
        id: &str,
        user_id: &str,
    ) -> Result<bool> {
        let now = Utc::now().fixed_offset();
        let res = alert_history::Entity::update_many()
            .col_expr(
                alert_history::Column::Status,
                Expr::value(AlertStatus::Acknowledged.to_string()),
            )
            .col_expr(
                alert_history::Column::AcknowledgedBy,
                Expr::value(Some(user_id.to_string())),
            )
            .col_expr(alert_history::Column::AcknowledgedAt, Expr::value(Some(now)))
            .filter(alert_history::Column::Id.eq(id))
            .filter(alert_history::Column::WorkspaceId.eq(workspace_id))
            .filter(alert_history::Column::Status.eq(AlertStatus::Triggered.to_string()))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }

    /// triggered|acknowledged → resolved.
    pub async fn resolve_alert(&self, workspace_id: &str, id: &str) -> Result<bool> {
        let now = Utc::now().fixed_offset();
        let res = alert_history::Entity::update_many()
            .col_expr(
                alert_history::Column::Status,
                Expr::value(AlertStatus::Resolved.to_string()),
            )
            .col_expr(alert_history::Column::ResolvedAt, Expr::value(Some(now)))
            .filter(alert_history::Column::Id.eq(id))
            .filter(alert_history::Column::WorkspaceId.eq(workspace_id))
            .filter(alert_history::Column::Status.is_in([
                AlertStatus::Triggered.to_string(),
                AlertStatus::Acknowledged.to_string(),
            ]))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }
}
