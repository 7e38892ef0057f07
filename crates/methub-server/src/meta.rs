use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::config::MetaConfig;

const GRAPH_TIMEOUT: Duration = Duration::from_secs(10);

/// Token response from the OAuth code exchange.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// One provider-side object discovered during resource sync.
#[derive(Debug, Clone)]
pub struct DiscoveredResource {
    pub resource_type: &'static str,
    pub resource_id: String,
    pub name: String,
    pub metadata: Value,
}

/// Thin Meta Graph API client: OAuth code exchange, lead enrichment and
/// resource enumeration. Everything here talks to Meta, never to
/// customer endpoints.
pub struct MetaClient {
    http: reqwest::Client,
    app_id: String,
    app_secret: String,
    graph_base: String,
    oauth_scopes: String,
}

impl MetaClient {
    pub fn new(config: &MetaConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            graph_base: config.graph_api_base.trim_end_matches('/').to_string(),
            oauth_scopes: config.oauth_scopes.clone(),
        }
    }

    /// Browser URL that starts the OAuth dialog.
    pub fn oauth_dialog_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://www.facebook.com/v19.0/dialog/oauth?client_id={}&redirect_uri={}&state={}&scope={}",
            self.app_id,
            urlencode(redirect_uri),
            urlencode(state),
            urlencode(&self.oauth_scopes),
        )
    }

    /// Exchange the callback `code` for a user access token.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let url = format!(
            "{}/oauth/access_token?client_id={}&client_secret={}&redirect_uri={}&code={}",
            self.graph_base,
            self.app_id,
            self.app_secret,
            urlencode(redirect_uri),
            urlencode(code),
        );
        let response = self.http.get(&url).timeout(GRAPH_TIMEOUT).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("token exchange failed with HTTP {status}");
        }
        Ok(response.json().await?)
    }

    /// Fetch the full lead record for enrichment. Callers treat failures
    /// as non-fatal.
    pub async fn fetch_lead(&self, leadgen_id: &str, access_token: &str) -> Result<Value> {
        let url = format!(
            "{}/{}?fields=field_data,created_time,ad_id,form_id&access_token={}",
            self.graph_base,
            leadgen_id,
            urlencode(access_token),
        );
        let response = self.http.get(&url).timeout(GRAPH_TIMEOUT).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("lead fetch failed with HTTP {status}");
        }
        Ok(response.json().await?)
    }

    /// Enumerate the account's pages (with their access tokens and lead
    /// forms) and ad accounts. Partial failures skip the affected branch.
    pub async fn sync_resources(&self, access_token: &str) -> Result<Vec<DiscoveredResource>> {
        let mut resources = Vec::new();

        let pages = self
            .get_list(&format!(
                "{}/me/accounts?fields=id,name,access_token&access_token={}",
                self.graph_base,
                urlencode(access_token),
            ))
            .await?;
        for page in pages {
            let Some(page_id) = page.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            let name = page
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let page_token = page
                .get("access_token")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());

            resources.push(DiscoveredResource {
                resource_type: "page",
                resource_id: page_id.to_string(),
                name: name.clone(),
                metadata: match &page_token {
                    Some(token) => serde_json::json!({ "access_token": token }),
                    None => serde_json::json!({}),
                },
            });

            // Lead forms hang off the page, using its token when present.
            let form_token = page_token.as_deref().unwrap_or(access_token);
            match self
                .get_list(&format!(
                    "{}/{}/leadgen_forms?fields=id,name&access_token={}",
                    self.graph_base,
                    page_id,
                    urlencode(form_token),
                ))
                .await
            {
                Ok(forms) => {
                    for form in forms {
                        if let Some(form_id) = form.get("id").and_then(|v| v.as_str()) {
                            resources.push(DiscoveredResource {
                                resource_type: "lead_form",
                                resource_id: form_id.to_string(),
                                name: form
                                    .get("name")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or_default()
                                    .to_string(),
                                metadata: serde_json::json!({ "page_id": page_id }),
                            });
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(page_id = %page_id, error = %e, "Lead form enumeration failed");
                }
            }
        }

        match self
            .get_list(&format!(
                "{}/me/adaccounts?fields=id,name&access_token={}",
                self.graph_base,
                urlencode(access_token),
            ))
            .await
        {
            Ok(accounts) => {
                for account in accounts {
                    if let Some(id) = account.get("id").and_then(|v| v.as_str()) {
                        resources.push(DiscoveredResource {
                            resource_type: "ad_account",
                            resource_id: id.to_string(),
                            name: account
                                .get("name")
                                .and_then(|v| v.as_str())
                                .unwrap_or_default()
                                .to_string(),
                            metadata: serde_json::json!({}),
                        });
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ad account enumeration failed");
            }
        }

        Ok(resources)
    }

    /// GET a Graph collection endpoint and return its `data` array.
    async fn get_list(&self, url: &str) -> Result<Vec<Value>> {
        let response = self.http.get(url).timeout(GRAPH_TIMEOUT).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("graph request failed with HTTP {status}");
        }
        let body: Value = response.json().await?;
        Ok(body
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}
