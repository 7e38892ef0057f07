use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;

use crate::receiver::{self, MetaEnvelope};
use crate::state::AppState;

/// Meta's subscription challenge: echo `hub.challenge` iff the verify
/// token matches.
#[utoipa::path(
    get,
    path = "/webhook/meta",
    tag = "Webhook",
    responses(
        (status = 200, description = "Challenge echoed"),
        (status = 403, description = "Verify token mismatch")
    )
)]
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    let expected = &state.config.meta.webhook_verify_token;
    if mode == Some("subscribe") && !expected.is_empty() && token == Some(expected.as_str()) {
        (StatusCode::OK, challenge).into_response()
    } else {
        tracing::warn!("Webhook verification rejected");
        (StatusCode::FORBIDDEN, "forbidden").into_response()
    }
}

/// Inbound Meta envelope. Always acknowledged fast; delivery happens in
/// the background. A configured app secret makes the
/// `X-Hub-Signature-256` check mandatory for signed requests.
#[utoipa::path(
    post,
    path = "/webhook/meta",
    tag = "Webhook",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Envelope accepted or ignored"),
        (status = 403, description = "Signature mismatch")
    )
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let secret = &state.config.meta.app_secret;
    if !secret.is_empty() {
        if let Some(signature) = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
        {
            if !methub_delivery::verify_signature_header(secret.as_bytes(), &body, signature) {
                tracing::warn!("Webhook signature mismatch");
                return (StatusCode::FORBIDDEN, "signature mismatch").into_response();
            }
        }
    }

    let envelope: MetaEnvelope = match serde_json::from_slice(&body) {
        Ok(env) => env,
        Err(_) => {
            // Unparseable payloads are acknowledged and dropped.
            return (
                StatusCode::OK,
                Json(serde_json::json!({ "status": "ignored", "processed": 0 })),
            )
                .into_response();
        }
    };

    let summary = receiver::process_envelope(&state, envelope).await;
    if summary.enqueue_failures > 0 {
        // Meta retries on 5xx; dedup on the provider event id keeps the
        // already-enqueued routes from forwarding twice.
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(summary)).into_response();
    }
    (StatusCode::OK, Json(summary)).into_response()
}
