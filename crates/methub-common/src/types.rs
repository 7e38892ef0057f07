use serde::{Deserialize, Serialize};

/// Inbound source kind a route binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Whatsapp,
    Forms,
    Ads,
    Webhook,
    Any,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Whatsapp => write!(f, "whatsapp"),
            SourceType::Forms => write!(f, "forms"),
            SourceType::Ads => write!(f, "ads"),
            SourceType::Webhook => write!(f, "webhook"),
            SourceType::Any => write!(f, "any"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whatsapp" => Ok(SourceType::Whatsapp),
            "forms" => Ok(SourceType::Forms),
            "ads" => Ok(SourceType::Ads),
            "webhook" => Ok(SourceType::Webhook),
            "any" => Ok(SourceType::Any),
            _ => Err(format!("unknown source type: {s}")),
        }
    }
}

/// Delivery lifecycle of one forwardable payload.
///
/// `Delivered`, `Dlq` and `Cancelled` are terminal (`Dlq` until a manual
/// resend). `next_retry_at` must be null in all terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
    Dlq,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Dlq | DeliveryStatus::Cancelled
        )
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Processing => write!(f, "processing"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::Dlq => write!(f, "dlq"),
            DeliveryStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "processing" => Ok(DeliveryStatus::Processing),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            "dlq" => Ok(DeliveryStatus::Dlq),
            "cancelled" => Ok(DeliveryStatus::Cancelled),
            _ => Err(format!("unknown delivery status: {s}")),
        }
    }
}

/// Authentication scheme applied when calling a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    None,
    Hmac,
    Bearer,
    Basic,
    ApiKey,
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthType::None => write!(f, "none"),
            AuthType::Hmac => write!(f, "hmac"),
            AuthType::Bearer => write!(f, "bearer"),
            AuthType::Basic => write!(f, "basic"),
            AuthType::ApiKey => write!(f, "api_key"),
        }
    }
}

impl std::str::FromStr for AuthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(AuthType::None),
            "hmac" => Ok(AuthType::Hmac),
            "bearer" => Ok(AuthType::Bearer),
            "basic" => Ok(AuthType::Basic),
            "api_key" => Ok(AuthType::ApiKey),
            _ => Err(format!("unknown auth type: {s}")),
        }
    }
}

/// Severity of a structured log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

/// Subsystem a structured log row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Webhook,
    Delivery,
    Oauth,
    Whatsapp,
    Mapping,
    System,
    Billing,
    Auth,
    Alert,
}

impl std::fmt::Display for LogCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogCategory::Webhook => write!(f, "webhook"),
            LogCategory::Delivery => write!(f, "delivery"),
            LogCategory::Oauth => write!(f, "oauth"),
            LogCategory::Whatsapp => write!(f, "whatsapp"),
            LogCategory::Mapping => write!(f, "mapping"),
            LogCategory::System => write!(f, "system"),
            LogCategory::Billing => write!(f, "billing"),
            LogCategory::Auth => write!(f, "auth"),
            LogCategory::Alert => write!(f, "alert"),
        }
    }
}

impl std::str::FromStr for LogCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webhook" => Ok(LogCategory::Webhook),
            "delivery" => Ok(LogCategory::Delivery),
            "oauth" => Ok(LogCategory::Oauth),
            "whatsapp" => Ok(LogCategory::Whatsapp),
            "mapping" => Ok(LogCategory::Mapping),
            "system" => Ok(LogCategory::System),
            "billing" => Ok(LogCategory::Billing),
            "auth" => Ok(LogCategory::Auth),
            "alert" => Ok(LogCategory::Alert),
            _ => Err(format!("unknown log category: {s}")),
        }
    }
}

/// Condition kind of an alert rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertConditionType {
    ErrorRate,
    DlqThreshold,
    LatencyThreshold,
    NoEvents,
    ConsecutiveFails,
    Custom,
}

impl std::fmt::Display for AlertConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertConditionType::ErrorRate => write!(f, "error_rate"),
            AlertConditionType::DlqThreshold => write!(f, "dlq_threshold"),
            AlertConditionType::LatencyThreshold => write!(f, "latency_threshold"),
            AlertConditionType::NoEvents => write!(f, "no_events"),
            AlertConditionType::ConsecutiveFails => write!(f, "consecutive_fails"),
            AlertConditionType::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for AlertConditionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error_rate" => Ok(AlertConditionType::ErrorRate),
            "dlq_threshold" => Ok(AlertConditionType::DlqThreshold),
            "latency_threshold" => Ok(AlertConditionType::LatencyThreshold),
            "no_events" => Ok(AlertConditionType::NoEvents),
            "consecutive_fails" => Ok(AlertConditionType::ConsecutiveFails),
            "custom" => Ok(AlertConditionType::Custom),
            _ => Err(format!("unknown alert condition type: {s}")),
        }
    }
}

/// Lifecycle state of one alert firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Triggered,
    Acknowledged,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Triggered => write!(f, "triggered"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "triggered" => Ok(AlertStatus::Triggered),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}
