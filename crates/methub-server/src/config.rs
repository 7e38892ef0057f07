use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub meta: MetaConfig,
    #[serde(default = "default_app_url")]
    pub app_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub alert: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaConfig {
    /// OAuth client id of the Meta app.
    #[serde(default)]
    pub app_id: String,
    /// OAuth client secret; also signs OAuth state and verifies inbound
    /// webhook signatures.
    #[serde(default)]
    pub app_secret: String,
    /// Shared secret echoed back on the webhook verification challenge.
    #[serde(default)]
    pub webhook_verify_token: String,
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,
    #[serde(default = "default_oauth_scopes")]
    pub oauth_scopes: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            webhook_verify_token: String::new(),
            graph_api_base: default_graph_api_base(),
            oauth_scopes: default_oauth_scopes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret validating session bearer tokens. Tokens are issued by the
    /// external auth service with the same secret.
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_expire_secs")]
    pub token_expire_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expire_secs: default_token_expire_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_delivery_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Concurrent outbound calls allowed per workspace for inline first
    /// attempts and resends.
    #[serde(default = "default_per_workspace_concurrency")]
    pub per_workspace_concurrency: usize,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Window for best-effort dedup on provider event ids. Zero disables.
    #[serde(default = "default_dedupe_window_hours")]
    pub dedupe_window_hours: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_delivery_tick_secs(),
            batch_size: default_batch_size(),
            per_workspace_concurrency: default_per_workspace_concurrency(),
            default_timeout_ms: default_timeout_ms(),
            dedupe_window_hours: default_dedupe_window_hours(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_alert_tick_secs")]
    pub tick_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_alert_tick_secs(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_db_url() -> String {
    "sqlite://data/methub.db?mode=rwc".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_oauth_scopes() -> String {
    "whatsapp_business_management,whatsapp_business_messaging,pages_show_list,leads_retrieval,ads_read"
        .to_string()
}

fn default_token_expire_secs() -> u64 {
    86400
}

fn default_delivery_tick_secs() -> u64 {
    30
}

fn default_batch_size() -> u64 {
    50
}

fn default_per_workspace_concurrency() -> usize {
    32
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_dedupe_window_hours() -> u32 {
    24
}

fn default_alert_tick_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            database: DatabaseConfig::default(),
            meta: MetaConfig::default(),
            app_url: default_app_url(),
            auth: AuthConfig::default(),
            delivery: DeliveryConfig::default(),
            alert: AlertConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file (falling back to defaults when the file does
    /// not exist), then apply environment overrides.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config: Self = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides; this is the closed set of deployment
    /// variables.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("META_APP_ID") {
            self.meta.app_id = v;
        }
        if let Ok(v) = std::env::var("META_APP_SECRET") {
            self.meta.app_secret = v;
        }
        if let Ok(v) = std::env::var("META_WEBHOOK_VERIFY_TOKEN") {
            self.meta.webhook_verify_token = v;
        }
        if let Ok(v) = std::env::var("APP_URL") {
            self.app_url = v;
        }
        if let Ok(v) = std::env::var("DB_URL") {
            self.database.url = v;
        }
    }

    /// Startup validation. A missing Meta credential set is a fatal
    /// misconfiguration: the receiver could neither verify challenges nor
    /// sign OAuth state.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.meta.app_id.is_empty() {
            anyhow::bail!("META_APP_ID is not configured");
        }
        if self.meta.app_secret.is_empty() {
            anyhow::bail!("META_APP_SECRET is not configured");
        }
        if self.meta.webhook_verify_token.is_empty() {
            anyhow::bail!("META_WEBHOOK_VERIFY_TOKEN is not configured");
        }
        Ok(())
    }
}
