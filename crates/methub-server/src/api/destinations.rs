use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
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
use methub_common::types::AuthType;
use methub_storage::{DestinationRow, DestinationUpdate};

/// Destination timeouts are clamped to this range at the API boundary.
const TIMEOUT_MS_RANGE: std::ops::RangeInclusive<i32> = 1000..=30000;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkspaceParam {
    pub workspace_id: String,
}

/// Paginated destination list.
#[utoipa::path(
    get,
    path = "/destinations",
    tag = "Destinations",
    security(("bearer_auth" = [])),
    params(WorkspaceParam, PaginationParams),
    responses(
        (status = 200, description = "Destinations"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn list_destinations(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(ws): Query<WorkspaceParam>,
    Query(pagination): Query<PaginationParams>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &ws.workspace_id).await {
        return resp;
    }

    let total = match state.store.count_destinations(&ws.workspace_id).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count destinations");
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
        .list_destinations(&ws.workspace_id, pagination.limit(), pagination.offset())
        .await
    {
        Ok(rows) => success_paginated_response(
            StatusCode::OK,
            &trace_id.0,
            rows,
            total,
            pagination.limit(),
            pagination.offset(),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list destinations");
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
pub struct CreateDestinationRequest {
    workspace_id: String,
    name: String,
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    headers: Option<serde_json::Value>,
    #[serde(default = "default_auth_type")]
    auth_type: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    auth_config: Option<serde_json::Value>,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: i32,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_auth_type() -> String {
    "none".to_string()
}

fn default_timeout_ms() -> i32 {
    10_000
}

fn default_active() -> bool {
    true
}

/// Create a destination.
#[utoipa::path(
    post,
    path = "/destinations",
    tag = "Destinations",
    security(("bearer_auth" = [])),
    request_body = CreateDestinationRequest,
    responses(
        (status = 201, description = "Destination created", body = crate::api::IdResponse),
        (status = 400, description = "Invalid URL, method or auth type", body = crate::api::ApiError),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn create_destination(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateDestinationRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    if reqwest::Url::parse(&req.url).is_err() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id.0,
            "invalid_url",
            &format!("'{}' is not a valid URL", req.url),
        );
    }
    if !matches!(req.method.to_uppercase().as_str(), "POST" | "PUT" | "PATCH") {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id.0,
            "invalid_enum",
            "method must be POST, PUT or PATCH",
        );
    }
    if AuthType::from_str(&req.auth_type).is_err() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id.0,
            "invalid_enum",
            &format!("unknown auth type '{}'", req.auth_type),
        );
    }

    let row = DestinationRow {
        id: methub_common::id::next_id(),
        workspace_id: req.workspace_id,
        name: req.name,
        url: req.url,
        method: req.method.to_uppercase(),
        headers_json: req.headers.unwrap_or(serde_json::json!({})).to_string(),
        auth_type: req.auth_type,
        auth_config_json: req.auth_config.unwrap_or(serde_json::json!({})).to_string(),
        timeout_ms: req
            .timeout_ms
            .clamp(*TIMEOUT_MS_RANGE.start(), *TIMEOUT_MS_RANGE.end()),
        is_active: req.is_active,
        deleted_at: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    match state.store.insert_destination(&row).await {
        Ok(dest) => success_id_response(StatusCode::CREATED, &trace_id.0, dest.id),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create destination");
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
pub struct UpdateDestinationRequest {
    workspace_id: String,
    name: Option<String>,
    url: Option<String>,
    method: Option<String>,
    #[schema(value_type = Option<Object>)]
    headers: Option<serde_json::Value>,
    auth_type: Option<String>,
    #[schema(value_type = Option<Object>)]
    auth_config: Option<serde_json::Value>,
    timeout_ms: Option<i32>,
    is_active: Option<bool>,
}

/// Update a destination.
#[utoipa::path(
    put,
    path = "/destinations/{id}",
    tag = "Destinations",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Destination id")),
    request_body = UpdateDestinationRequest,
    responses(
        (status = 200, description = "Destination updated", body = crate::api::IdResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Destination not found", body = crate::api::ApiError)
    )
)]
pub async fn update_destination(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDestinationRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    if let Some(url) = &req.url {
        if reqwest::Url::parse(url).is_err() {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id.0,
                "invalid_url",
                &format!("'{url}' is not a valid URL"),
            );
        }
    }

    let update = DestinationUpdate {
        name: req.name,
        url: req.url,
        method: req.method.map(|m| m.to_uppercase()),
        headers_json: req.headers.map(|v| v.to_string()),
        auth_type: req.auth_type,
        auth_config_json: req.auth_config.map(|v| v.to_string()),
        timeout_ms: req
            .timeout_ms
            .map(|t| t.clamp(*TIMEOUT_MS_RANGE.start(), *TIMEOUT_MS_RANGE.end())),
        is_active: req.is_active,
    };

    match state
        .store
        .update_destination(&req.workspace_id, &id, &update)
        .await
    {
        Ok(Some(dest)) => success_id_response(StatusCode::OK, &trace_id.0, dest.id),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id.0,
            "not_found",
            "Destination not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to update destination");
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
pub struct DeleteDestinationRequest {
    workspace_id: String,
}

/// Soft-delete a destination. Referencing routes are deactivated.
#[utoipa::path(
    delete,
    path = "/destinations/{id}",
    tag = "Destinations",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Destination id")),
    request_body = DeleteDestinationRequest,
    responses(
        (status = 200, description = "Destination deleted", body = crate::api::IdResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Destination not found", body = crate::api::ApiError)
    )
)]
pub async fn delete_destination(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DeleteDestinationRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    match state
        .store
        .soft_delete_destination(&req.workspace_id, &id)
        .await
    {
        Ok(true) => {
            match state.store.deactivate_routes_for_destination(&id).await {
                Ok(count) if count > 0 => {
                    tracing::info!(destination_id = %id, routes = count, "Deactivated routes of deleted destination");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(destination_id = %id, error = %e, "Route deactivation cascade failed");
                }
            }
            success_id_response(StatusCode::OK, &trace_id.0, id)
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id.0,
            "not_found",
            "Destination not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete destination");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}
