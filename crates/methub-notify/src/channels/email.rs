use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{NotifyError, Result};
use crate::plugin::ChannelPlugin;
use crate::{AlertNotification, NotificationChannel};

#[derive(Debug, Deserialize)]
struct EmailConfig {
    smtp_host: String,
    #[serde(default = "default_smtp_port")]
    smtp_port: u16,
    username: Option<String>,
    password: Option<String>,
    from: String,
    recipients: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    recipients: Vec<String>,
}

impl EmailChannel {
    fn new(config: EmailConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from,
            recipients: config.recipients,
        })
    }

    fn format_body(alert: &AlertNotification) -> String {
        let snapshot = serde_json::to_string_pretty(&alert.snapshot)
            .unwrap_or_else(|_| alert.snapshot.to_string());
        format!(
            "Alert: {}\nRule: {} ({})\nWorkspace: {}\nTriggered: {}\n\nMeasured values:\n{}\n",
            alert.message,
            alert.rule_name,
            alert.condition_type,
            alert.workspace_id,
            alert.triggered_at.to_rfc3339(),
            snapshot
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, alert: &AlertNotification) -> Result<()> {
        let from: lettre::message::Mailbox = self
            .from
            .parse()
            .map_err(|_| NotifyError::InvalidConfig(format!("bad from address '{}'", self.from)))?;
        let subject = format!("[methub] {}", alert.rule_name);
        let body = Self::format_body(alert);

        for recipient in &self.recipients {
            let Ok(to) = recipient.parse::<lettre::message::Mailbox>() else {
                tracing::warn!(recipient = %recipient, "Skipping invalid email recipient");
                continue;
            };
            let message = Message::builder()
                .from(from.clone())
                .to(to)
                .subject(&subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| NotifyError::Smtp(e.to_string()))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        }
        Ok(())
    }

    fn channel_type(&self) -> &str {
        "email"
    }
}

pub struct EmailPlugin;

impl ChannelPlugin for EmailPlugin {
    fn name(&self) -> &str {
        "email"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let parsed: EmailConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(e.to_string()))?;
        if parsed.recipients.is_empty() {
            return Err(NotifyError::InvalidConfig(
                "email channel needs at least one recipient".to_string(),
            ));
        }
        Ok(())
    }

    fn create_channel(&self, config: &Value) -> Result<Box<dyn NotificationChannel>> {
        let parsed: EmailConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(e.to_string()))?;
        Ok(Box::new(EmailChannel::new(parsed)?))
    }
}
