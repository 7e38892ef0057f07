use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{NotifyError, Result};
use crate::plugin::ChannelPlugin;
use crate::{AlertNotification, NotificationChannel};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct WebhookConfig {
    webhook_url: String,
}

pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, alert: &AlertNotification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(alert)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Api {
                service: "webhook".to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn channel_type(&self) -> &str {
        "webhook"
    }
}

pub struct WebhookPlugin;

impl ChannelPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let parsed: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(e.to_string()))?;
        if !parsed.webhook_url.starts_with("http") {
            return Err(NotifyError::InvalidConfig(format!(
                "webhook_url '{}' is not an http(s) URL",
                parsed.webhook_url
            )));
        }
        Ok(())
    }

    fn create_channel(&self, config: &Value) -> Result<Box<dyn NotificationChannel>> {
        let parsed: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(e.to_string()))?;
        Ok(Box::new(WebhookChannel::new(parsed.webhook_url)))
    }
}
