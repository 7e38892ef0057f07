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
use methub_common::types::SourceType;
use methub_storage::{RouteRow, RouteUpdate};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkspaceParam {
    pub workspace_id: String,
}

/// Paginated route list.
#[utoipa::path(
    get,
    path = "/routes",
    tag = "Routes",
    security(("bearer_auth" = [])),
    params(WorkspaceParam, PaginationParams),
    responses(
        (status = 200, description = "Routes"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn list_routes(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(ws): Query<WorkspaceParam>,
    Query(pagination): Query<PaginationParams>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &ws.workspace_id).await {
        return resp;
    }

    let total = match state.store.count_routes(&ws.workspace_id).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count routes");
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
        .list_routes(&ws.workspace_id, pagination.limit(), pagination.offset())
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
            tracing::error!(error = %e, "Failed to list routes");
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
pub struct CreateRouteRequest {
    workspace_id: String,
    source_type: String,
    #[serde(default)]
    source_id: Option<String>,
    destination_id: String,
    #[serde(default)]
    mapping_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    filter_rules: Option<serde_json::Value>,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Create a route binding a source to a destination.
#[utoipa::path(
    post,
    path = "/routes",
    tag = "Routes",
    security(("bearer_auth" = [])),
    request_body = CreateRouteRequest,
    responses(
        (status = 201, description = "Route created", body = crate::api::IdResponse),
        (status = 400, description = "Invalid source type or priority", body = crate::api::ApiError),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Destination not found", body = crate::api::ApiError)
    )
)]
pub async fn create_route(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateRouteRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    if SourceType::from_str(&req.source_type).is_err() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id.0,
            "invalid_enum",
            &format!("unknown source type '{}'", req.source_type),
        );
    }
    if !(0..=100).contains(&req.priority) {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id.0,
            "bad_request",
            "priority must be between 0 and 100",
        );
    }

    // The destination must exist in the same workspace.
    match state
        .store
        .get_destination(&req.workspace_id, &req.destination_id)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id.0,
                "not_found",
                "Destination not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load destination");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            );
        }
    }

    let row = RouteRow {
        id: methub_common::id::next_id(),
        workspace_id: req.workspace_id,
        source_type: req.source_type,
        source_id: req.source_id.filter(|s| !s.is_empty()),
        destination_id: req.destination_id,
        mapping_id: req.mapping_id.filter(|s| !s.is_empty()),
        filter_rules_json: req.filter_rules.map(|v| v.to_string()),
        priority: req.priority,
        is_active: req.is_active,
        deleted_at: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    match state.store.insert_route(&row).await {
        Ok(route) => success_id_response(StatusCode::CREATED, &trace_id.0, route.id),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create route");
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
pub struct UpdateRouteRequest {
    workspace_id: String,
    source_type: Option<String>,
    /// Empty string clears to catch-all; omitted leaves unchanged.
    source_id: Option<String>,
    destination_id: Option<String>,
    /// Empty string detaches the mapping; omitted leaves unchanged.
    mapping_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    filter_rules: Option<serde_json::Value>,
    priority: Option<i32>,
    is_active: Option<bool>,
}

/// Update a route.
#[utoipa::path(
    put,
    path = "/routes/{id}",
    tag = "Routes",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Route id")),
    request_body = UpdateRouteRequest,
    responses(
        (status = 200, description = "Route updated", body = crate::api::IdResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Route not found", body = crate::api::ApiError)
    )
)]
pub async fn update_route(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRouteRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    let update = RouteUpdate {
        source_type: req.source_type,
        source_id: req
            .source_id
            .map(|s| if s.is_empty() { None } else { Some(s) }),
        destination_id: req.destination_id,
        mapping_id: req
            .mapping_id
            .map(|s| if s.is_empty() { None } else { Some(s) }),
        filter_rules_json: req
            .filter_rules
            .map(|v| if v.is_null() { None } else { Some(v.to_string()) }),
        priority: req.priority,
        is_active: req.is_active,
    };

    match state.store.update_route(&req.workspace_id, &id, &update).await {
        Ok(Some(route)) => success_id_response(StatusCode::OK, &trace_id.0, route.id),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id.0,
            "not_found",
            "Route not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to update route");
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
pub struct DeleteRouteRequest {
    workspace_id: String,
}

/// Soft-delete a route.
#[utoipa::path(
    delete,
    path = "/routes/{id}",
    tag = "Routes",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Route id")),
    request_body = DeleteRouteRequest,
    responses(
        (status = 200, description = "Route deleted", body = crate::api::IdResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Route not found", body = crate::api::ApiError)
    )
)]
pub async fn delete_route(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DeleteRouteRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    match state.store.soft_delete_route(&req.workspace_id, &id).await {
        Ok(true) => success_id_response(StatusCode::OK, &trace_id.0, id),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id.0,
            "not_found",
            "Route not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete route");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}
