use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use methub_common::types::AuthType;
use serde::Deserialize;
use serde_json::Value;

use crate::signing;

/// Recorded response bodies are capped at 2000 bytes.
const MAX_CAPTURED_BODY_BYTES: usize = 2000;

/// Where and how to deliver: the client-facing projection of a
/// destination row.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub auth_type: AuthType,
    pub auth_config: Value,
    pub timeout_ms: u64,
}

/// Result of a single delivery attempt. `status_code` is absent on
/// network errors and timeouts.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
}

impl AttemptOutcome {
    /// Success means HTTP 200-299.
    pub fn is_success(&self) -> bool {
        matches!(self.status_code, Some(c) if (200..300).contains(&c))
    }
}

/// Per-destination credentials, parsed from `auth_config_json`. Only the
/// fields relevant to the destination's auth type are read.
#[derive(Debug, Default, Deserialize)]
struct AuthConfig {
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
    header_name: Option<String>,
    api_key: Option<String>,
    secret: Option<String>,
}

/// HTTP client for customer destinations.
///
/// Holds one shared reqwest client; per-call timeouts come from the
/// destination configuration and act as a hard cancellation deadline.
pub struct DestinationClient {
    http: reqwest::Client,
}

impl Default for DestinationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DestinationClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Perform one delivery attempt. Never returns an error: every
    /// failure mode is folded into the [`AttemptOutcome`].
    pub async fn call(
        &self,
        target: &Target,
        body: &Value,
        event_id: &str,
        attempt_number: u32,
    ) -> AttemptOutcome {
        let started = Instant::now();
        let body_bytes = match serde_json::to_vec(body) {
            Ok(b) => b,
            Err(e) => {
                return AttemptOutcome {
                    status_code: None,
                    response_body: None,
                    error_message: Some(format!("payload serialization failed: {e}")),
                    duration_ms: started.elapsed().as_millis() as i64,
                }
            }
        };

        let headers = match build_headers(target, &body_bytes, event_id, attempt_number) {
            Ok(h) => h,
            Err(msg) => {
                return AttemptOutcome {
                    status_code: None,
                    response_body: None,
                    error_message: Some(msg),
                    duration_ms: started.elapsed().as_millis() as i64,
                }
            }
        };

        let method = match target.method.to_uppercase().as_str() {
            "PUT" => reqwest::Method::PUT,
            "PATCH" => reqwest::Method::PATCH,
            _ => reqwest::Method::POST,
        };

        let mut request = self
            .http
            .request(method, &target.url)
            .timeout(Duration::from_millis(target.timeout_ms))
            .body(body_bytes);
        for (name, value) in &headers {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                AttemptOutcome {
                    status_code: Some(status),
                    response_body: Some(truncate(text)),
                    error_message: None,
                    duration_ms: started.elapsed().as_millis() as i64,
                }
            }
            Err(err) => {
                let message = if err.is_timeout() {
                    format!("Timeout after {}ms", target.timeout_ms)
                } else {
                    format!("request failed: {err}")
                };
                AttemptOutcome {
                    status_code: None,
                    response_body: None,
                    error_message: Some(message),
                    duration_ms: started.elapsed().as_millis() as i64,
                }
            }
        }
    }
}

/// Assemble the full header set: fixed headers, then user-supplied
/// destination headers, then auth headers (auth wins on collision).
fn build_headers(
    target: &Target,
    body_bytes: &[u8],
    event_id: &str,
    attempt_number: u32,
) -> Result<Vec<(String, String)>, String> {
    let mut headers: Vec<(String, String)> = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        (
            "User-Agent".to_string(),
            concat!("methub/", env!("CARGO_PKG_VERSION")).to_string(),
        ),
        ("X-MetaHub-Event-Id".to_string(), event_id.to_string()),
        ("X-MetaHub-Attempt".to_string(), attempt_number.to_string()),
    ];

    for (name, value) in &target.headers {
        headers.push((name.clone(), value.clone()));
    }

    let config: AuthConfig =
        serde_json::from_value(target.auth_config.clone()).unwrap_or_default();

    match target.auth_type {
        AuthType::None => {}
        AuthType::Bearer => {
            let token = config
                .token
                .filter(|t| !t.is_empty())
                .ok_or("auth config missing 'token' for bearer auth")?;
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        AuthType::Basic => {
            let (user, pass) = match (config.username, config.password) {
                (Some(u), Some(p)) => (u, p),
                _ => return Err("auth config missing 'username'/'password' for basic auth".into()),
            };
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
            headers.push(("Authorization".to_string(), format!("Basic {encoded}")));
        }
        AuthType::ApiKey => {
            let key = config
                .api_key
                .filter(|k| !k.is_empty())
                .ok_or("auth config missing 'api_key'")?;
            let name = config
                .header_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "X-Api-Key".to_string());
            headers.push((name, key));
        }
        AuthType::Hmac => {
            let secret = config
                .secret
                .filter(|s| !s.is_empty())
                .ok_or("auth config missing 'secret' for hmac auth")?;
            headers.push((
                "X-Hub-Signature-256".to_string(),
                signing::signature_header(secret.as_bytes(), body_bytes),
            ));
        }
    }

    Ok(headers)
}

fn truncate(body: String) -> String {
    if body.len() <= MAX_CAPTURED_BODY_BYTES {
        return body;
    }
    let mut end = MAX_CAPTURED_BODY_BYTES;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target(auth_type: AuthType, auth_config: Value) -> Target {
        Target {
            url: "https://hooks.example.com/in".to_string(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            auth_type,
            auth_config,
            timeout_ms: 5000,
        }
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn fixed_headers_are_always_present() {
        let t = target(AuthType::None, json!({}));
        let headers = build_headers(&t, b"{}", "evt-1", 3).unwrap();
        assert_eq!(header(&headers, "Content-Type"), Some("application/json"));
        assert_eq!(header(&headers, "X-MetaHub-Event-Id"), Some("evt-1"));
        assert_eq!(header(&headers, "X-MetaHub-Attempt"), Some("3"));
        assert!(header(&headers, "Authorization").is_none());
    }

    #[test]
    fn bearer_and_basic_auth_headers() {
        let t = target(AuthType::Bearer, json!({"token": "tok123"}));
        let headers = build_headers(&t, b"{}", "e", 1).unwrap();
        assert_eq!(header(&headers, "Authorization"), Some("Bearer tok123"));

        let t = target(AuthType::Basic, json!({"username": "u", "password": "p"}));
        let headers = build_headers(&t, b"{}", "e", 1).unwrap();
        // base64("u:p")
        assert_eq!(header(&headers, "Authorization"), Some("Basic dTpw"));
    }

    #[test]
    fn api_key_header_name_defaults() {
        let t = target(AuthType::ApiKey, json!({"api_key": "k1"}));
        let headers = build_headers(&t, b"{}", "e", 1).unwrap();
        assert_eq!(header(&headers, "X-Api-Key"), Some("k1"));

        let t = target(
            AuthType::ApiKey,
            json!({"api_key": "k1", "header_name": "X-Custom"}),
        );
        let headers = build_headers(&t, b"{}", "e", 1).unwrap();
        assert_eq!(header(&headers, "X-Custom"), Some("k1"));
    }

    #[test]
    fn hmac_signature_matches_body() {
        let t = target(AuthType::Hmac, json!({"secret": "s3cr3t"}));
        let body = br#"{"a":1}"#;
        let headers = build_headers(&t, body, "e", 1).unwrap();
        let value = header(&headers, "X-Hub-Signature-256").unwrap();
        assert!(crate::signing::verify_signature_header(
            b"s3cr3t", body, value
        ));
    }

    #[test]
    fn missing_credentials_are_reported() {
        let t = target(AuthType::Bearer, json!({}));
        assert!(build_headers(&t, b"{}", "e", 1).is_err());
        let t = target(AuthType::Hmac, json!({"secret": ""}));
        assert!(build_headers(&t, b"{}", "e", 1).is_err());
    }

    #[test]
    fn user_headers_are_carried() {
        let mut t = target(AuthType::None, json!({}));
        t.headers
            .insert("X-Tenant".to_string(), "acme".to_string());
        let headers = build_headers(&t, b"{}", "e", 1).unwrap();
        assert_eq!(header(&headers, "X-Tenant"), Some("acme"));
    }
}
