/// Errors that can occur within the notification subsystem.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or holds an
    /// invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// The channel type is not registered in the plugin registry.
    #[error("Notify: unknown channel type '{0}'")]
    UnknownChannelType(String),

    /// An HTTP request to an external notification endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// SMTP transport error when sending email.
    #[error("Notify: SMTP error: {0}")]
    Smtp(String),

    /// JSON serialization or deserialization failed.
    #[error("Notify: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The external API returned a non-success response.
    #[error("Notify: API error from {service}: status={status}")]
    Api { service: String, status: u16 },
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
