use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::api::{
    error_response, success_id_response, success_paginated_response, PaginationParams,
};
use crate::auth::{require_member, Claims};
use crate::logging::TraceId;
use crate::state::AppState;
use methub_common::types::AlertConditionType;
use methub_storage::{AlertRuleRow, AlertRuleUpdate};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkspaceParam {
    pub workspace_id: String,
}

/// Paginated alert rules of a workspace.
#[utoipa::path(
    get,
    path = "/alerts/rules",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(WorkspaceParam, PaginationParams),
    responses(
        (status = 200, description = "Alert rules"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn list_alert_rules(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(ws): Query<WorkspaceParam>,
    Query(pagination): Query<PaginationParams>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &ws.workspace_id).await {
        return resp;
    }

    let total = match state.store.count_alert_rules(&ws.workspace_id).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count alert rules");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            );
        }
    };

    match state
        .store
        .list_alert_rules(&ws.workspace_id, pagination.limit(), pagination.offset())
        .await
    {
        Ok(rules) => success_paginated_response(
            StatusCode::OK,
            &trace_id.0,
            rules,
            total,
            pagination.limit(),
            pagination.offset(),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list alert rules");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateAlertRuleRequest {
    workspace_id: String,
    name: String,
    condition_type: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    condition_config: Option<serde_json::Value>,
    #[serde(default = "default_channels")]
    notify_channels: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    notify_config: Option<serde_json::Value>,
    #[serde(default = "default_cooldown_minutes")]
    cooldown_minutes: i32,
    #[serde(default = "default_enabled")]
    is_active: bool,
}

fn default_channels() -> Vec<String> {
    vec!["in_app".to_string()]
}

fn default_cooldown_minutes() -> i32 {
    60
}

fn default_enabled() -> bool {
    true
}

/// Create an alert rule.
#[utoipa::path(
    post,
    path = "/alerts/rules",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    request_body = CreateAlertRuleRequest,
    responses(
        (status = 201, description = "Rule created", body = crate::api::IdResponse),
        (status = 400, description = "Invalid condition type", body = crate::api::ApiError),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn create_alert_rule(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateAlertRuleRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    if AlertConditionType::from_str(&req.condition_type).is_err() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id.0,
            "invalid_enum",
            &format!("unknown condition type '{}'", req.condition_type),
        );
    }
    if req.cooldown_minutes < 1 {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id.0,
            "bad_request",
            "cooldown_minutes must be at least 1",
        );
    }

    let row = AlertRuleRow {
        id: methub_common::id::next_id(),
        workspace_id: req.workspace_id,
        name: req.name,
        condition_type: req.condition_type,
        condition_config_json: req
            .condition_config
            .unwrap_or(serde_json::json!({}))
            .to_string(),
        notify_channels_json: serde_json::to_string(&req.notify_channels)
            .unwrap_or_else(|_| "[]".to_string()),
        notify_config_json: req.notify_config.unwrap_or(serde_json::json!({})).to_string(),
        cooldown_minutes: req.cooldown_minutes,
        last_triggered_at: None,
        trigger_count: 0,
        is_active: req.is_active,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    match state.store.insert_alert_rule(&row).await {
        Ok(rule) => success_id_response(StatusCode::CREATED, &trace_id.0, rule.id),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create alert rule");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateAlertRuleRequest {
    workspace_id: String,
    name: Option<String>,
    #[schema(value_type = Option<Object>)]
    condition_config: Option<serde_json::Value>,
    notify_channels: Option<Vec<String>>,
    #[schema(value_type = Option<Object>)]
    notify_config: Option<serde_json::Value>,
    cooldown_minutes: Option<i32>,
    is_active: Option<bool>,
}

/// Update an alert rule.
#[utoipa::path(
    put,
    path = "/alerts/rules/{id}",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Rule id")),
    request_body = UpdateAlertRuleRequest,
    responses(
        (status = 200, description = "Rule updated", body = crate::api::IdResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Rule not found", body = crate::api::ApiError)
    )
)]
pub async fn update_alert_rule(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAlertRuleRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    if let Some(cooldown) = req.cooldown_minutes {
        if cooldown < 1 {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id.0,
                "bad_request",
                "cooldown_minutes must be at least 1",
            );
        }
    }

    let update = AlertRuleUpdate {
        name: req.name,
        condition_config_json: req.condition_config.map(|v| v.to_string()),
        notify_channels_json: req
            .notify_channels
            .map(|v| serde_json::to_string(&v).unwrap_or_else(|_| "[]".to_string())),
        notify_config_json: req.notify_config.map(|v| v.to_string()),
        cooldown_minutes: req.cooldown_minutes,
        is_active: req.is_active,
    };

    match state
        .store
        .update_alert_rule(&req.workspace_id, &id, &update)
        .await
    {
        Ok(Some(rule)) => success_id_response(StatusCode::OK, &trace_id.0, rule.id),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id.0,
            "not_found",
            "Rule not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to update alert rule");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct DeleteRuleRequest {
    workspace_id: String,
}

/// Delete an alert rule.
#[utoipa::path(
    delete,
    path = "/alerts/rules/{id}",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Rule id")),
    request_body = DeleteRuleRequest,
    responses(
        (status = 200, description = "Rule deleted", body = crate::api::IdResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Rule not found", body = crate::api::ApiError)
    )
)]
pub async fn delete_alert_rule(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DeleteRuleRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    match state.store.delete_alert_rule(&req.workspace_id, &id).await {
        Ok(true) => success_id_response(StatusCode::OK, &trace_id.0, id),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id.0,
            "not_found",
            "Rule not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete alert rule");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AlertHistoryParams {
    pub workspace_id: String,
    /// Restrict to one rule.
    #[param(required = false)]
    #[serde(rename = "rule_id__eq")]
    pub rule_id_eq: Option<String>,
}

/// Alert firing history, newest first.
#[utoipa::path(
    get,
    path = "/alerts/history",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    params(AlertHistoryParams, PaginationParams),
    responses(
        (status = 200, description = "Alert history"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn list_alert_history(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(params): Query<AlertHistoryParams>,
    Query(pagination): Query<PaginationParams>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &params.workspace_id).await
    {
        return resp;
    }

    match state
        .store
        .list_alert_history(
            &params.workspace_id,
            params.rule_id_eq.as_deref(),
            pagination.limit(),
            pagination.offset(),
        )
        .await
    {
        Ok(rows) => {
            let total = rows.len() as u64 + pagination.offset();
            success_paginated_response(
                StatusCode::OK,
                &trace_id.0,
                rows,
                total,
                pagination.limit(),
                pagination.offset(),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list alert history");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AlertActionRequest {
    alert_id: String,
}

/// Acknowledge a triggered alert.
#[utoipa::path(
    post,
    path = "/alerts/acknowledge",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    request_body = AlertActionRequest,
    responses(
        (status = 204, description = "Acknowledged"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Alert not found", body = crate::api::ApiError),
        (status = 409, description = "Alert is not in triggered state", body = crate::api::ApiError)
    )
)]
pub async fn acknowledge_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<AlertActionRequest>,
) -> Response {
    let history = match state.store.get_alert_history_by_id(&req.alert_id).await {
        Ok(Some(h)) => h,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id.0,
                "not_found",
                "Alert not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load alert");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            );
        }
    };

    if let Err(resp) =
        require_member(&state, &trace_id.0, &claims.sub, &history.workspace_id).await
    {
        return resp;
    }

    match state
        .store
        .acknowledge_alert(&history.workspace_id, &req.alert_id, &claims.sub)
        .await
    {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(
            StatusCode::CONFLICT,
            &trace_id.0,
            "conflict",
            "Alert is not in triggered state",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to acknowledge alert");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Resolve a triggered or acknowledged alert.
#[utoipa::path(
    post,
    path = "/alerts/resolve",
    tag = "Alerts",
    security(("bearer_auth" = [])),
    request_body = AlertActionRequest,
    responses(
        (status = 204, description = "Resolved"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Alert not found", body = crate::api::ApiError),
        (status = 409, description = "Alert already resolved", body = crate::api::ApiError)
    )
)]
pub async fn resolve_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<AlertActionRequest>,
) -> Response {
    let history = match state.store.get_alert_history_by_id(&req.alert_id).await {
        Ok(Some(h)) => h,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id.0,
                "not_found",
                "Alert not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load alert");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            );
        }
    };

    if let Err(resp) =
        require_member(&state, &trace_id.0, &claims.sub, &history.workspace_id).await
    {
        return resp;
    }

    match state
        .store
        .resolve_alert(&history.workspace_id, &req.alert_id)
        .await
    {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(
            StatusCode::CONFLICT,
            &trace_id.0,
            "conflict",
            "Alert already resolved",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to resolve alert");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}
