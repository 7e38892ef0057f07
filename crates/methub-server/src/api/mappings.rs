use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::{
    error_response, success_id_response, success_paginated_response, PaginationParams,
};
use crate::auth::{require_member, Claims};
use crate::logging::TraceId;
use crate::state::AppState;
use methub_mapping::MappingRule;
use methub_storage::MappingRow;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WorkspaceParam {
    pub workspace_id: String,
}

/// Paginated mapping list.
#[utoipa::path(
    get,
    path = "/mappings",
    tag = "Mappings",
    security(("bearer_auth" = [])),
    params(WorkspaceParam, PaginationParams),
    responses(
        (status = 200, description = "Mappings"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn list_mappings(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(ws): Query<WorkspaceParam>,
    Query(pagination): Query<PaginationParams>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &ws.workspace_id).await {
        return resp;
    }

    let total = match state.store.count_mappings(&ws.workspace_id).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count mappings");
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
        .list_mappings(&ws.workspace_id, pagination.limit(), pagination.offset())
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
            tracing::error!(error = %e, "Failed to list mappings");
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
pub struct CreateMappingRequest {
    workspace_id: String,
    name: String,
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    rules: Vec<MappingRule>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    static_fields: Option<serde_json::Value>,
    #[serde(default)]
    pass_through: bool,
    #[serde(default = "default_source_type")]
    source_type: String,
}

fn default_mode() -> String {
    "field_map".to_string()
}

fn default_source_type() -> String {
    "any".to_string()
}

/// Create a mapping.
#[utoipa::path(
    post,
    path = "/mappings",
    tag = "Mappings",
    security(("bearer_auth" = [])),
    request_body = CreateMappingRequest,
    responses(
        (status = 201, description = "Mapping created", body = crate::api::IdResponse),
        (status = 400, description = "Structurally invalid mapping", body = crate::api::ApiError),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn create_mapping(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateMappingRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    if !matches!(req.mode.as_str(), "field_map" | "template") {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id.0,
            "invalid_enum",
            &format!("unknown mapping mode '{}'", req.mode),
        );
    }
    if req.mode == "template" && req.template.as_deref().unwrap_or("").is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id.0,
            "invalid_mapping",
            "template mode requires a template",
        );
    }

    let row = MappingRow {
        id: methub_common::id::next_id(),
        workspace_id: req.workspace_id,
        name: req.name,
        mode: req.mode,
        rules_json: serde_json::to_string(&req.rules).unwrap_or_else(|_| "[]".to_string()),
        template: req.template,
        static_fields_json: req
            .static_fields
            .unwrap_or(serde_json::json!({}))
            .to_string(),
        pass_through: req.pass_through,
        source_type: req.source_type,
        deleted_at: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    match state.store.insert_mapping(&row).await {
        Ok(mapping) => success_id_response(StatusCode::CREATED, &trace_id.0, mapping.id),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create mapping");
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
pub struct DeleteMappingRequest {
    workspace_id: String,
}

/// Soft-delete a mapping. Referencing routes are detached and fall back
/// to pass-through behaviour.
#[utoipa::path(
    delete,
    path = "/mappings/{id}",
    tag = "Mappings",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Mapping id")),
    request_body = DeleteMappingRequest,
    responses(
        (status = 200, description = "Mapping deleted", body = crate::api::IdResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Mapping not found", body = crate::api::ApiError)
    )
)]
pub async fn delete_mapping(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DeleteMappingRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    match state.store.soft_delete_mapping(&req.workspace_id, &id).await {
        Ok(true) => {
            match state.store.detach_mapping_from_routes(&id).await {
                Ok(count) if count > 0 => {
                    tracing::info!(mapping_id = %id, routes = count, "Detached mapping from routes");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(mapping_id = %id, error = %e, "Mapping detach cascade failed");
                }
            }
            success_id_response(StatusCode::OK, &trace_id.0, id)
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id.0,
            "not_found",
            "Mapping not found",
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete mapping");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}
