use chrono::Utc;
use serde_json::json;

use crate::channels::email::EmailPlugin;
use crate::channels::webhook::WebhookPlugin;
use crate::plugin::{ChannelPlugin, ChannelRegistry};
use crate::AlertNotification;

fn notification() -> AlertNotification {
    AlertNotification {
        alert_id: "a1".to_string(),
        workspace_id: "ws1".to_string(),
        rule_id: "r1".to_string(),
        rule_name: "dlq watch".to_string(),
        condition_type: "dlq_threshold".to_string(),
        status: "triggered".to_string(),
        message: "3 events in the dead-letter queue".to_string(),
        snapshot: json!({"dlq_count": 3, "threshold": 3}),
        triggered_at: Utc::now(),
    }
}

#[test]
fn registry_knows_builtin_channels() {
    let registry = ChannelRegistry::default();
    assert!(registry.has_plugin("email"));
    assert!(registry.has_plugin("webhook"));
    assert!(!registry.has_plugin("sms"));

    let err = registry
        .create_channel("sms", &json!({}))
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(err.contains("unknown channel type"));
}

#[test]
fn webhook_config_requires_http_url() {
    let plugin = WebhookPlugin;
    assert!(plugin
        .validate_config(&json!({"webhook_url": "https://ops.example.com/alerts"}))
        .is_ok());
    assert!(plugin
        .validate_config(&json!({"webhook_url": "ftp://nope"}))
        .is_err());
    assert!(plugin.validate_config(&json!({})).is_err());
}

#[test]
fn email_config_requires_recipients() {
    let plugin = EmailPlugin;
    assert!(plugin
        .validate_config(&json!({
            "smtp_host": "smtp.example.com",
            "from": "alerts@example.com",
            "recipients": ["ops@example.com"]
        }))
        .is_ok());
    assert!(plugin
        .validate_config(&json!({
            "smtp_host": "smtp.example.com",
            "from": "alerts@example.com",
            "recipients": []
        }))
        .is_err());
}

#[test]
fn notification_serializes_with_snapshot() {
    let serialized = serde_json::to_value(notification()).unwrap();
    assert_eq!(serialized["rule_name"], "dlq watch");
    assert_eq!(serialized["snapshot"]["dlq_count"], 3);
    assert_eq!(serialized["status"], "triggered");
}

#[tokio::test]
async fn in_app_dispatch_writes_log_row() {
    use methub_storage::{AlertRuleRow, HubStore, LogFilter};
    use std::sync::Arc;

    let store = Arc::new(HubStore::connect("sqlite::memory:").await.unwrap());
    let manager = crate::manager::NotificationManager::new(ChannelRegistry::default(), store.clone());

    let rule = AlertRuleRow {
        id: "r1".to_string(),
        workspace_id: "ws1".to_string(),
        name: "dlq watch".to_string(),
        condition_type: "dlq_threshold".to_string(),
        condition_config_json: "{}".to_string(),
        notify_channels_json: "[\"in_app\"]".to_string(),
        notify_config_json: "{}".to_string(),
        cooldown_minutes: 10,
        last_triggered_at: None,
        trigger_count: 0,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let notified = manager.dispatch(&rule, &notification()).await;
    assert_eq!(notified, vec!["in_app".to_string()]);

    let logs = store
        .list_logs(
            "ws1",
            &LogFilter {
                category_eq: Some("alert".to_string()),
                ..Default::default()
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, "alert.triggered");
}
