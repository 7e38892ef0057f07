use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;

use crate::api::{error_response, success_paginated_response, PaginationParams};
use crate::auth::{require_member, Claims};
use crate::logging::TraceId;
use crate::state::AppState;
use methub_storage::LogFilter;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListLogsParams {
    pub workspace_id: String,
    /// Level filter (debug / info / warn / error / critical).
    #[param(required = false)]
    #[serde(rename = "level__eq")]
    pub level_eq: Option<String>,
    /// Category filter (webhook / delivery / oauth / ...).
    #[param(required = false)]
    #[serde(rename = "category__eq")]
    pub category_eq: Option<String>,
    /// Case-insensitive substring match on the message.
    #[param(required = false)]
    #[serde(rename = "message__contains")]
    pub message_contains: Option<String>,
}

/// Structured event log of a workspace, newest first.
#[utoipa::path(
    get,
    path = "/logs",
    tag = "Logs",
    security(("bearer_auth" = [])),
    params(ListLogsParams, PaginationParams),
    responses(
        (status = 200, description = "Log rows"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn list_logs(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(params): Query<ListLogsParams>,
    Query(pagination): Query<PaginationParams>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &params.workspace_id).await
    {
        return resp;
    }

    let filter = LogFilter {
        level_eq: params.level_eq,
        category_eq: params.category_eq,
        message_contains: params.message_contains,
    };

    let total = match state.store.count_logs(&params.workspace_id, &filter).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count logs");
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
        .list_logs(
            &params.workspace_id,
            &filter,
            pagination.limit(),
            pagination.offset(),
        )
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
            tracing::error!(error = %e, "Failed to list logs");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}
