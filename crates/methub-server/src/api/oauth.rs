use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::api::{error_response, success_response};
use crate::auth::{require_member, Claims};
use crate::logging::TraceId;
use crate::oauth_state::{sign_state, verify_state, StatePayload};
use crate::state::AppState;
use methub_common::types::{LogCategory, LogLevel};
use methub_storage::{IntegrationRow, MetaResourceRow, NewLogEntry};

#[derive(Deserialize, ToSchema)]
pub struct OAuthStartRequest {
    workspace_id: String,
}

#[derive(Serialize, ToSchema)]
struct OAuthStartResponse {
    url: String,
    state: String,
}

fn callback_uri(app_url: &str) -> String {
    format!("{}/oauth/meta/callback", app_url.trim_end_matches('/'))
}

/// Begin the Meta OAuth dance: returns the dialog URL with an HMAC-signed
/// state bound to the workspace and caller.
#[utoipa::path(
    post,
    path = "/oauth/meta/start",
    tag = "OAuth",
    security(("bearer_auth" = [])),
    request_body = OAuthStartRequest,
    responses(
        (status = 200, description = "Dialog URL and signed state", body = OAuthStartResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::ApiError),
        (status = 403, description = "Not a workspace member", body = crate::api::ApiError)
    )
)]
pub async fn oauth_start(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<OAuthStartRequest>,
) -> Response {
    if let Err(resp) = require_member(&state, &trace_id.0, &claims.sub, &req.workspace_id).await {
        return resp;
    }

    let payload = StatePayload {
        wid: req.workspace_id.clone(),
        uid: claims.sub.clone(),
        ts: Utc::now().timestamp_millis(),
    };
    let signed = sign_state(state.config.meta.app_secret.as_bytes(), &payload);
    let url = state
        .meta
        .oauth_dialog_url(&callback_uri(&state.config.app_url), &signed);

    success_response(
        StatusCode::OK,
        &trace_id.0,
        OAuthStartResponse { url, state: signed },
    )
}

/// OAuth redirect target. Verifies the signed state, exchanges the code,
/// stores the integration, enumerates provider resources and bounces the
/// browser back to the UI.
#[utoipa::path(
    get,
    path = "/oauth/meta/callback",
    tag = "OAuth",
    responses(
        (status = 302, description = "Redirect back to the UI"),
        (status = 403, description = "State verification failed", body = crate::api::ApiError)
    )
)]
pub async fn oauth_callback(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let code = params.get("code").cloned().unwrap_or_default();
    let raw_state = params.get("state").cloned().unwrap_or_default();
    if code.is_empty() || raw_state.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id.0,
            "bad_request",
            "missing code or state",
        );
    }

    let payload = match verify_state(
        state.config.meta.app_secret.as_bytes(),
        &raw_state,
        Utc::now().timestamp_millis(),
    ) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "OAuth state verification failed");
            return error_response(
                StatusCode::FORBIDDEN,
                &trace_id.0,
                "invalid_state",
                "state verification failed",
            );
        }
    };

    let token = match state
        .meta
        .exchange_code(&code, &callback_uri(&state.config.app_url))
        .await
    {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "OAuth code exchange failed");
            return Redirect::temporary(&format!(
                "{}/integrations?error=oauth_exchange_failed",
                state.config.app_url.trim_end_matches('/')
            ))
            .into_response();
        }
    };

    let integration = IntegrationRow {
        id: methub_common::id::next_id(),
        workspace_id: payload.wid.clone(),
        provider: "meta".to_string(),
        access_token: token.access_token.clone(),
        token_expires_at: token
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs)),
        scopes_json: serde_json::to_string(
            &state
                .config
                .meta
                .oauth_scopes
                .split(',')
                .map(str::trim)
                .collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".to_string()),
        connected_by: payload.uid.clone(),
        last_synced_at: None,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let stored = match state.store.upsert_integration(&integration).await {
        Ok(row) => row,
        Err(e) => {
            tracing::error!(error = %e, "Failed to store integration");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id.0,
                "storage_error",
                "Database error",
            );
        }
    };

    // Best-effort inventory sync; failure leaves the integration usable.
    match state.meta.sync_resources(&token.access_token).await {
        Ok(discovered) => {
            let rows: Vec<MetaResourceRow> = discovered
                .into_iter()
                .map(|r| MetaResourceRow {
                    id: methub_common::id::next_id(),
                    workspace_id: payload.wid.clone(),
                    integration_id: stored.id.clone(),
                    resource_type: r.resource_type.to_string(),
                    resource_id: r.resource_id,
                    name: r.name,
                    metadata_json: r.metadata.to_string(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .collect();
            let count = rows.len();
            if let Err(e) = state.store.replace_meta_resources(&stored.id, &rows).await {
                tracing::error!(error = %e, "Failed to store meta resources");
            } else {
                let _ = state.store.mark_integration_synced(&stored.id).await;
                tracing::info!(workspace_id = %payload.wid, resources = count, "Meta resources synced");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Meta resource sync failed");
        }
    }

    let entry = NewLogEntry::new(
        &payload.wid,
        LogLevel::Info,
        LogCategory::Oauth,
        "oauth.connected",
        "Meta account connected",
    )
    .resource(stored.id.clone());
    if let Err(e) = state.store.append_log(entry).await {
        tracing::error!(error = %e, "Failed to write oauth log");
    }

    Redirect::temporary(&format!(
        "{}/integrations?connected=meta",
        state.config.app_url.trim_end_matches('/')
    ))
    .into_response()
}
