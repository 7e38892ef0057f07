use std::sync::Arc;

use methub_common::types::{LogCategory, LogLevel};
use methub_storage::{AlertRuleRow, HubStore, NewLogEntry};

use crate::plugin::ChannelRegistry;
use crate::AlertNotification;

/// Dispatches one alert firing to the channels its rule names.
///
/// `in_app` is handled directly: the notification *is* a log-sink row,
/// so it always succeeds. External channels are created per dispatch
/// from the rule's `notify_config` and a failing channel is simply left
/// out of the returned acceptance list.
pub struct NotificationManager {
    registry: ChannelRegistry,
    store: Arc<HubStore>,
}

impl NotificationManager {
    pub fn new(registry: ChannelRegistry, store: Arc<HubStore>) -> Self {
        Self { registry, store }
    }

    /// Send to every channel on the rule. Returns the names of the
    /// channels that accepted the notification (`notified_via`).
    pub async fn dispatch(&self, rule: &AlertRuleRow, alert: &AlertNotification) -> Vec<String> {
        let channels: Vec<String> =
            serde_json::from_str(&rule.notify_channels_json).unwrap_or_default();
        let config: serde_json::Value =
            serde_json::from_str(&rule.notify_config_json).unwrap_or(serde_json::json!({}));

        let mut notified_via = Vec::new();
        for channel_name in &channels {
            match channel_name.as_str() {
                "in_app" => {
                    let entry = NewLogEntry::new(
                        &alert.workspace_id,
                        LogLevel::Warn,
                        LogCategory::Alert,
                        "alert.triggered",
                        alert.message.clone(),
                    )
                    .resource(alert.alert_id.clone())
                    .metadata(alert.snapshot.clone());
                    match self.store.append_log(entry).await {
                        Ok(_) => notified_via.push("in_app".to_string()),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to write in-app notification");
                        }
                    }
                }
                other => {
                    let channel_config = config
                        .get(other)
                        .cloned()
                        .unwrap_or(serde_json::json!({}));
                    match self.registry.create_channel(other, &channel_config) {
                        Ok(channel) => match channel.send(alert).await {
                            Ok(()) => notified_via.push(other.to_string()),
                            Err(e) => {
                                tracing::warn!(
                                    channel = %other,
                                    rule_id = %rule.id,
                                    error = %e,
                                    "Notification channel rejected alert"
                                );
                            }
                        },
                        Err(e) => {
                            tracing::warn!(
                                channel = %other,
                                rule_id = %rule.id,
                                error = %e,
                                "Failed to create notification channel"
                            );
                        }
                    }
                }
            }
        }
        notified_via
    }
}
