//! Notification fan-out for alert firings.
//!
//! A fired alert is dispatched to the channels named on its rule:
//! `in_app` (a log-sink row, always accepted), `email` (SMTP via lettre)
//! and `webhook` (HTTP POST of the alert JSON). Channel implementations
//! are created per dispatch from the rule's `notify_config` through the
//! [`plugin::ChannelRegistry`]; the [`manager::NotificationManager`]
//! records which channels accepted.

pub mod channels;
pub mod error;
pub mod manager;
pub mod plugin;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// The payload handed to channels: one alert firing.
#[derive(Debug, Clone, Serialize)]
pub struct AlertNotification {
    pub alert_id: String,
    pub workspace_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub condition_type: String,
    pub status: String,
    pub message: String,
    pub snapshot: serde_json::Value,
    pub triggered_at: DateTime<Utc>,
}

/// A notification delivery channel backed by an external service.
///
/// Instances are created by the matching [`plugin::ChannelPlugin`] from
/// the per-rule channel configuration and used for a single dispatch.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver the alert. An error means the channel did not accept it
    /// and is excluded from the firing's `notified_via` record.
    async fn send(&self, alert: &AlertNotification) -> Result<()>;

    /// Channel type name (`"email"`, `"webhook"`).
    fn channel_type(&self) -> &str;
}
