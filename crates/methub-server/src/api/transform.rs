use std::time::Instant;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use methub_mapping::{MappingDef, MappingMode, MappingRule};

#[derive(Deserialize, ToSchema)]
pub struct PreviewRequest {
    /// Field rules, applied in order (field_map mode).
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    rules: Vec<MappingRule>,
    /// Sample payload to transform.
    #[schema(value_type = Object)]
    payload: Value,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    static_fields: Option<Value>,
    /// `field_map` or `template`.
    mode: String,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    pass_through: bool,
}

#[derive(Serialize, ToSchema)]
struct PreviewResponse {
    success: bool,
    #[schema(value_type = Option<Object>)]
    output: Option<Value>,
    warnings: Vec<String>,
    error: Option<String>,
    duration_ms: i64,
}

/// Dry-run a mapping against a sample payload. Used by the mapping
/// editor; nothing is persisted.
#[utoipa::path(
    post,
    path = "/transform/preview",
    tag = "Transform",
    security(("bearer_auth" = [])),
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "Transform result", body = PreviewResponse),
        (status = 400, description = "Invalid mapping mode", body = crate::api::ApiError),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError)
    )
)]
pub async fn preview_transform(
    Extension(trace_id): Extension<TraceId>,
    State(_state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Response {
    let mode = match req.mode.as_str() {
        "field_map" => MappingMode::FieldMap,
        "template" => MappingMode::Template,
        other => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id.0,
                "invalid_enum",
                &format!("unknown mapping mode '{other}'"),
            )
        }
    };

    let def = MappingDef {
        mode,
        rules: req.rules,
        template: req.template,
        static_fields: req.static_fields,
        pass_through: req.pass_through,
    };

    let started = Instant::now();
    let result = methub_mapping::apply(&def, &req.payload);
    let duration_ms = started.elapsed().as_millis() as i64;

    match result {
        Ok(output) => success_response(
            StatusCode::OK,
            &trace_id.0,
            PreviewResponse {
                success: true,
                output: Some(output.output),
                warnings: output.warnings,
                error: None,
                duration_ms,
            },
        ),
        Err(e) => success_response(
            StatusCode::OK,
            &trace_id.0,
            PreviewResponse {
                success: false,
                output: None,
                warnings: Vec::new(),
                error: Some(e.to_string()),
                duration_ms,
            },
        ),
    }
}
