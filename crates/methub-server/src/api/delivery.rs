use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::{
    error_response, success_paginated_response, success_response, PaginationParams,
};
use crate::auth::{require_member, Claims};
use crate::logging::TraceId;
use crate::state::AppState;
use methub_storage::EventFilter;

/// Run one delivery worker cycle on demand.
#[utoipa::path(
    post,
    path = "/delivery/process",
    tag = "Delivery",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Cycle summary"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn process_deliveries(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.worker.process_cycle().await {
        Ok(summary) => success_response(StatusCode::OK, &trace_id.0, summary),
        Err(e) => {
            tracing::error!(error = %e, "Delivery cycle failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "internal_error",
                "Delivery cycle failed",
            )
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ResendRequest {
    event_id: String,
}

/// Resend a failed or dead-lettered event. Grants one extra attempt and
/// fires it inline.
#[utoipa::path(
    post,
    path = "/delivery/resend",
    tag = "Delivery",
    security(("bearer_auth" = [])),
    request_body = ResendRequest,
    responses(
        (status = 200, description = "Resend outcome"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 403, description = "Not a workspace member", body = crate::api::ApiError),
        (status = 404, description = "Event not found", body = crate::api::ApiError)
    )
)]
pub async fn resend_delivery(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<ResendRequest>,
) -> Response {
    let event = match state.store.get_event(&req.event_id).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id.0,
                "not_found",
                "Event not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load event");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            );
        }
    };

    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &event.workspace_id).await {
        return resp;
    }

    match state.worker.resend(&event).await {
        Ok(outcome) => success_response(StatusCode::OK, &trace_id.0, outcome),
        Err(e) => {
            tracing::error!(event_id = %event.id, error = %e, "Resend failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "internal_error",
                "Resend failed",
            )
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct TestRequest {
    destination_id: String,
}

#[derive(Serialize, ToSchema)]
struct TestResponse {
    success: bool,
    status_code: Option<u16>,
    response_body: Option<String>,
    duration_ms: i64,
    error: Option<String>,
}

/// Dry-run a destination with a canned sample payload. Nothing is
/// persisted.
#[utoipa::path(
    post,
    path = "/delivery/test",
    tag = "Delivery",
    security(("bearer_auth" = [])),
    request_body = TestRequest,
    responses(
        (status = 200, description = "Attempt outcome", body = TestResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Destination not found", body = crate::api::ApiError)
    )
)]
pub async fn test_destination(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<TestRequest>,
) -> Response {
    let destination = match state.store.get_destination_by_id(&req.destination_id).await {
        Ok(Some(d)) if d.deleted_at.is_none() => d,
        Ok(_) => {
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
    };

    if let Err(resp) =
        require_member(&state, &trace_id.0, &claims.sub, &destination.workspace_id).await
    {
        return resp;
    }

    let outcome = state.worker.test(&destination).await;
    success_response(
        StatusCode::OK,
        &trace_id.0,
        TestResponse {
            success: outcome.is_success(),
            status_code: outcome.status_code,
            response_body: outcome.response_body,
            duration_ms: outcome.duration_ms,
            error: outcome.error_message,
        },
    )
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEventsParams {
    /// Workspace to list events for.
    pub workspace_id: String,
    /// Status filter (pending / processing / delivered / failed / dlq / cancelled).
    #[param(required = false)]
    #[serde(rename = "status__eq")]
    pub status_eq: Option<String>,
    /// Destination filter.
    #[param(required = false)]
    #[serde(rename = "destination_id__eq")]
    pub destination_id_eq: Option<String>,
}

/// Paginated delivery event list, newest first.
#[utoipa::path(
    get,
    path = "/events",
    tag = "Delivery",
    security(("bearer_auth" = [])),
    params(ListEventsParams, PaginationParams),
    responses(
        (status = 200, description = "Events"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn list_events(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(params): Query<ListEventsParams>,
    Query(pagination): Query<PaginationParams>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &params.workspace_id).await
    {
        return resp;
    }

    let filter = EventFilter {
        status_eq: params.status_eq,
        destination_id_eq: params.destination_id_eq,
        created_gte: None,
    };

    let total = match state.store.count_events(&params.workspace_id, &filter).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count events");
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
        .list_events(
            &params.workspace_id,
            &filter,
            pagination.limit(),
            pagination.offset(),
        )
        .await
    {
        Ok(events) => success_paginated_response(
            StatusCode::OK,
            &trace_id.0,
            events,
            total,
            pagination.limit(),
            pagination.offset(),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list events");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// Attempts of one event, in attempt order.
#[utoipa::path(
    get,
    path = "/events/{id}/attempts",
    tag = "Delivery",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Attempts"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 404, description = "Event not found", body = crate::api::ApiError)
    )
)]
pub async fn list_event_attempts(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let event = match state.store.get_event(&id).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id.0,
                "not_found",
                "Event not found",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load event");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            );
        }
    };

    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &event.workspace_id).await {
        return resp;
    }

    match state.store.list_attempts(&id).await {
        Ok(attempts) => success_response(StatusCode::OK, &trace_id.0, attempts),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list attempts");
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
pub struct StatsParams {
    pub workspace_id: String,
    /// Trailing window in hours (default 24).
    #[param(required = false)]
    pub hours: Option<u32>,
}

/// Aggregate delivery counts over a trailing window.
#[utoipa::path(
    get,
    path = "/delivery/stats",
    tag = "Delivery",
    security(("bearer_auth" = [])),
    params(StatsParams),
    responses(
        (status = 200, description = "Window stats"),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn delivery_stats(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &params.workspace_id).await
    {
        return resp;
    }

    match state
        .store
        .stats_by_window(Some(&params.workspace_id), params.hours.unwrap_or(24))
        .await
    {
        Ok(stats) => success_response(StatusCode::OK, &trace_id.0, stats),
        Err(e) => {
            tracing::error!(error = %e, "Failed to compute stats");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            )
        }
    }
}
