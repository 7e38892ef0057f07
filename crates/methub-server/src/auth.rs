use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::error_response;
use crate::logging::TraceId;
use crate::state::AppState;

/// Session claims issued by the external auth service. `sub` is the
/// verified user id; workspace membership is checked separately per
/// operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

pub fn create_token(secret: &str, user_id: &str, expire_secs: u64) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + expire_secs,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn auth_error(trace_id: &str, msg: &str) -> Response {
    error_response(StatusCode::UNAUTHORIZED, trace_id, "unauthorized", msg)
}

/// Bearer session middleware for tenant-scoped endpoints.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = match auth_header {
        None => {
            return auth_error(&trace_id, "missing authorization header");
        }
        Some(header) => {
            if let Some(token) = header.strip_prefix("Bearer ") {
                if token.is_empty() {
                    return auth_error(&trace_id, "invalid authorization header");
                }
                token
            } else {
                return auth_error(&trace_id, "invalid authorization header");
            }
        }
    };

    match validate_token(&state.jwt_secret, token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            let msg = if matches!(
                e.kind(),
                jsonwebtoken::errors::ErrorKind::ExpiredSignature
            ) {
                "token expired"
            } else {
                "invalid token"
            };
            auth_error(&trace_id, msg)
        }
    }
}

/// The `(caller, tenant)` check every tenant-scoped operation performs.
/// Returns an error response to bubble straight back to the client when
/// the caller is not a member of the workspace.
pub async fn require_member(
    state: &AppState,
    trace_id: &str,
    user_id: &str,
    workspace_id: &str,
) -> Result<(), Response> {
    match state.store.is_member(workspace_id, user_id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(error_response(
            StatusCode::FORBIDDEN,
            trace_id,
            "forbidden",
            "caller is not a member of this workspace",
        )),
        Err(e) => {
            tracing::error!(error = %e, "Failed to check workspace membership");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "storage_error",
                "Database error",
            ))
        }
    }
}
