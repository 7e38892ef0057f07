pub mod alerts;
pub mod delivery;
pub mod destinations;
pub mod logs;
pub mod mappings;
pub mod oauth;
pub mod routes;
pub mod transform;
pub mod webhook;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::logging::TraceId;
use crate::state::AppState;

/// API error response.
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
}

/// Uniform response envelope.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// Error code (0 on success).
    pub err_code: i32,
    /// Error message ("success" on success).
    pub err_msg: String,
    pub trace_id: String,
    /// Business data, when there is any.
    pub data: Option<T>,
}

/// Paginated list payload.
#[derive(Serialize, ToSchema)]
pub struct PaginatedData<T>
where
    T: Serialize,
{
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Id-only payload for create/update/delete responses.
#[derive(Serialize, ToSchema)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page size (default 20, max 200).
    #[param(required = false)]
    pub limit: Option<u64>,
    /// Offset (default 0).
    #[param(required = false)]
    pub offset: Option<u64>,
}

impl PaginationParams {
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(20).clamp(1, 200)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn success_empty_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: 0,
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

pub fn success_paginated_response<T>(
    status: StatusCode,
    trace_id: &str,
    items: Vec<T>,
    total: u64,
    limit: u64,
    offset: u64,
) -> Response
where
    T: Serialize,
{
    success_response(
        status,
        trace_id,
        PaginatedData {
            items,
            total,
            limit,
            offset,
        },
    )
}

pub fn success_id_response(status: StatusCode, trace_id: &str, id: String) -> Response {
    success_response(status, trace_id, IdResponse { id })
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "unauthorized" => 1002,
        "token_expired" => 1003,
        "not_found" => 1004,
        "conflict" => 1005,
        "forbidden" => 1006,
        "invalid_url" => 1101,
        "invalid_enum" => 1102,
        "invalid_mapping" => 1103,
        "invalid_state" => 1104,
        "storage_error" => 1501,
        "upstream_error" => 1502,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// Health check response.
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    version: String,
    uptime_secs: i64,
    storage_status: String,
}

/// Service liveness. No authentication.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    success_response(
        StatusCode::OK,
        &trace_id.0,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            storage_status: "ok".to_string(),
        },
    )
}

/// Endpoints Meta and browsers hit directly: no session required.
pub fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(webhook::verify_webhook, webhook::receive_webhook))
        .routes(routes!(oauth::oauth_callback))
}

/// Tenant-scoped endpoints behind the bearer session middleware.
pub fn protected_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(delivery::process_deliveries))
        .routes(routes!(delivery::resend_delivery))
        .routes(routes!(delivery::test_destination))
        .routes(routes!(delivery::list_events))
        .routes(routes!(delivery::list_event_attempts))
        .routes(routes!(delivery::delivery_stats))
        .routes(routes!(transform::preview_transform))
        .routes(routes!(alerts::list_alert_rules, alerts::create_alert_rule))
        .routes(routes!(alerts::update_alert_rule, alerts::delete_alert_rule))
        .routes(routes!(alerts::list_alert_history))
        .routes(routes!(alerts::acknowledge_alert))
        .routes(routes!(alerts::resolve_alert))
        .routes(routes!(
            destinations::list_destinations,
            destinations::create_destination
        ))
        .routes(routes!(
            destinations::update_destination,
            destinations::delete_destination
        ))
        .routes(routes!(routes::list_routes, routes::create_route))
        .routes(routes!(routes::update_route, routes::delete_route))
        .routes(routes!(mappings::list_mappings, mappings::create_mapping))
        .routes(routes!(mappings::delete_mapping))
        .routes(routes!(logs::list_logs))
        .routes(routes!(oauth::oauth_start))
}
