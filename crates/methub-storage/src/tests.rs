use chrono::{Duration, Utc};
use methub_common::types::{DeliveryStatus, LogCategory, LogLevel};

use crate::store::HubStore;
use crate::{
    AlertHistoryRow, AlertRuleRow, AttemptRow, DestinationRow, EventPatch, LogFilter,
    NewDeliveryEvent, NewLogEntry, RouteRow,
};

async fn memory_store() -> HubStore {
    HubStore::connect("sqlite::memory:").await.unwrap()
}

fn destination(ws: &str, name: &str) -> DestinationRow {
    DestinationRow {
        id: methub_common::id::next_id(),
        workspace_id: ws.to_string(),
        name: name.to_string(),
        url: "https://hooks.example.com/in".to_string(),
        method: "POST".to_string(),
        headers_json: "{}".to_string(),
        auth_type: "none".to_string(),
        auth_config_json: "{}".to_string(),
        timeout_ms: 5000,
        is_active: true,
        deleted_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn route(ws: &str, source_type: &str, source_id: Option<&str>, dest: &str) -> RouteRow {
    RouteRow {
        id: methub_common::id::next_id(),
        workspace_id: ws.to_string(),
        source_type: source_type.to_string(),
        source_id: source_id.map(|s| s.to_string()),
        destination_id: dest.to_string(),
        mapping_id: None,
        filter_rules_json: None,
        priority: 0,
        is_active: true,
        deleted_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn new_event(ws: &str, route_id: &str, dest_id: &str) -> NewDeliveryEvent {
    NewDeliveryEvent {
        workspace_id: ws.to_string(),
        route_id: route_id.to_string(),
        destination_id: dest_id.to_string(),
        source_type: "whatsapp".to_string(),
        source_event_id: None,
        payload_json: "{\"k\":1}".to_string(),
        transformed_payload_json: None,
        max_attempts: 5,
        metadata_json: "{}".to_string(),
    }
}

fn attempt(event: &crate::DeliveryEventRow, number: i32, code: Option<i32>) -> AttemptRow {
    AttemptRow {
        id: String::new(),
        workspace_id: event.workspace_id.clone(),
        event_id: event.id.clone(),
        attempt_number: number,
        request_url: "https://hooks.example.com/in".to_string(),
        request_method: "POST".to_string(),
        status_code: code,
        response_body: None,
        error_message: if code.is_none() {
            Some("connection refused".to_string())
        } else {
            None
        },
        duration_ms: 12,
        attempted_at: Utc::now(),
    }
}

#[tokio::test]
async fn created_events_are_pending_and_immediately_claimable() {
    let store = memory_store().await;
    let event = store.create_event(new_event("ws1", "r1", "d1")).await.unwrap();
    assert_eq!(event.status, "pending");
    assert_eq!(event.attempts_count, 0);
    assert!(event.next_retry_at.is_some());

    let claimed = store.claim_ready_events(50).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, "processing");
    assert_eq!(claimed[0].attempts_count, 1);
}

#[tokio::test]
async fn claim_is_exclusive() {
    let store = memory_store().await;
    let event = store.create_event(new_event("ws1", "r1", "d1")).await.unwrap();

    let first = store.claim_event(&event.id).await.unwrap();
    assert!(first.is_some());
    // Second claim loses: the event is already processing.
    let second = store.claim_event(&event.id).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn transition_is_conditional_on_from_status() {
    let store = memory_store().await;
    let event = store.create_event(new_event("ws1", "r1", "d1")).await.unwrap();
    store.claim_event(&event.id).await.unwrap();

    // processing → delivered works once...
    let ok = store
        .transition(
            &event.id,
            &[DeliveryStatus::Processing],
            EventPatch {
                status: Some(DeliveryStatus::Delivered),
                delivered_at: Some(Some(Utc::now())),
                next_retry_at: Some(None),
                error_message: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(ok);

    // ...and the stale retry path is rejected afterwards.
    let stale = store
        .transition(
            &event.id,
            &[DeliveryStatus::Processing],
            EventPatch {
                status: Some(DeliveryStatus::Failed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!stale);

    let reloaded = store.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, "delivered");
    assert!(reloaded.delivered_at.is_some());
    assert!(reloaded.next_retry_at.is_none());
}

#[tokio::test]
async fn failed_events_become_ready_once_backoff_elapses() {
    let store = memory_store().await;
    let event = store.create_event(new_event("ws1", "r1", "d1")).await.unwrap();
    store.claim_event(&event.id).await.unwrap();

    // Fail with a retry scheduled in the future: not claimable.
    store
        .transition(
            &event.id,
            &[DeliveryStatus::Processing],
            EventPatch {
                status: Some(DeliveryStatus::Failed),
                next_retry_at: Some(Some(Utc::now() + Duration::seconds(60))),
                error_message: Some(Some("HTTP 500".to_string())),
                failed_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(store.claim_ready_events(50).await.unwrap().is_empty());

    // Pull the retry time into the past: claimable again, attempt 2.
    store
        .transition(
            &event.id,
            &[DeliveryStatus::Failed],
            EventPatch {
                next_retry_at: Some(Some(Utc::now() - Duration::seconds(1))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let claimed = store.claim_ready_events(50).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].attempts_count, 2);
}

#[tokio::test]
async fn attempts_are_dense_and_ordered() {
    let store = memory_store().await;
    let event = store.create_event(new_event("ws1", "r1", "d1")).await.unwrap();

    for (n, code) in [(1, Some(500)), (2, None), (3, Some(200))] {
        store.append_attempt(attempt(&event, n, code)).await.unwrap();
    }

    let attempts = store.list_attempts(&event.id).await.unwrap();
    let numbers: Vec<i32> = attempts.iter().map(|a| a.attempt_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(attempts[0].status_code, Some(500));
    assert_eq!(attempts[1].status_code, None);
}

#[tokio::test]
async fn response_body_is_truncated_to_cap() {
    let store = memory_store().await;
    let event = store.create_event(new_event("ws1", "r1", "d1")).await.unwrap();

    let mut a = attempt(&event, 1, Some(200));
    a.response_body = Some("x".repeat(5000));
    let stored = store.append_attempt(a).await.unwrap();
    assert_eq!(stored.response_body.unwrap().len(), 2000);
}

#[tokio::test]
async fn route_resolution_matches_specific_and_catch_all() {
    let store = memory_store().await;
    let d = store.insert_destination(&destination("ws1", "d1")).await.unwrap();

    let mut high = route("ws1", "whatsapp", Some("PN1"), &d.id);
    high.priority = 10;
    let high = store.insert_route(&high).await.unwrap();
    let catch_all = store.insert_route(&route("ws1", "whatsapp", None, &d.id)).await.unwrap();
    // Different source id: never matches PN1.
    store
        .insert_route(&route("ws1", "whatsapp", Some("PN2"), &d.id))
        .await
        .unwrap();
    // Inactive route: never returned.
    let mut inactive = route("ws1", "whatsapp", Some("PN1"), &d.id);
    inactive.is_active = false;
    store.insert_route(&inactive).await.unwrap();

    let matched = store
        .resolve_routes("ws1", "whatsapp", Some("PN1"))
        .await
        .unwrap();
    let ids: Vec<&str> = matched.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![high.id.as_str(), catch_all.id.as_str()]);

    // Catch-all is also returned when no source id is given.
    let unscoped = store.resolve_routes("ws1", "whatsapp", None).await.unwrap();
    assert_eq!(unscoped.len(), 1);
    assert_eq!(unscoped[0].id, catch_all.id);
}

#[tokio::test]
async fn destination_delete_deactivates_routes() {
    let store = memory_store().await;
    let d = store.insert_destination(&destination("ws1", "d1")).await.unwrap();
    store.insert_route(&route("ws1", "forms", None, &d.id)).await.unwrap();

    assert!(store.soft_delete_destination("ws1", &d.id).await.unwrap());
    let touched = store.deactivate_routes_for_destination(&d.id).await.unwrap();
    assert_eq!(touched, 1);

    assert!(store.get_destination("ws1", &d.id).await.unwrap().is_none());
    assert!(store.resolve_routes("ws1", "forms", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn log_sink_filters_by_level_category_and_message() {
    let store = memory_store().await;
    store
        .append_log(NewLogEntry::new(
            "ws1",
            LogLevel::Info,
            LogCategory::Webhook,
            "webhook.received",
            "received whatsapp change",
        ))
        .await
        .unwrap();
    store
        .append_log(NewLogEntry::new(
            "ws1",
            LogLevel::Error,
            LogCategory::Delivery,
            "delivery.failed",
            "HTTP 500 from destination",
        ))
        .await
        .unwrap();

    let errors = store
        .list_logs(
            "ws1",
            &LogFilter {
                level_eq: Some("error".to_string()),
                ..Default::default()
            },
            50,
            0,
        )
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category, "delivery");

    let matched = store
        .list_logs(
            "ws1",
            &LogFilter {
                message_contains: Some("whatsapp".to_string()),
                ..Default::default()
            },
            50,
            0,
        )
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].action, "webhook.received");

    // Other workspaces see nothing.
    assert_eq!(
        store.count_logs("ws2", &LogFilter::default()).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn stats_by_window_counts_statuses() {
    let store = memory_store().await;
    for _ in 0..3 {
        let e = store.create_event(new_event("ws1", "r1", "d1")).await.unwrap();
        store.claim_event(&e.id).await.unwrap();
        store
            .transition(
                &e.id,
                &[DeliveryStatus::Processing],
                EventPatch {
                    status: Some(DeliveryStatus::Dlq),
                    next_retry_at: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    store.create_event(new_event("ws1", "r1", "d1")).await.unwrap();

    let stats = store.stats_by_window(Some("ws1"), 24).await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.dlq, 3);
    assert_eq!(stats.pending, 1);

    assert_eq!(store.dlq_count("ws1").await.unwrap(), 3);
    assert_eq!(store.events_created_count("ws1", 10).await.unwrap(), 4);
}

#[tokio::test]
async fn recent_attempt_outcomes_report_success_flags() {
    let store = memory_store().await;
    let event = store.create_event(new_event("ws1", "r1", "d1")).await.unwrap();
    store.append_attempt(attempt(&event, 1, Some(500))).await.unwrap();
    store.append_attempt(attempt(&event, 2, None)).await.unwrap();
    store.append_attempt(attempt(&event, 3, Some(202))).await.unwrap();

    let outcomes = store.recent_attempt_outcomes("ws1", 10).await.unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
}

#[tokio::test]
async fn source_event_dedup_lookup() {
    let store = memory_store().await;
    let mut new = new_event("ws1", "r1", "d1");
    new.source_event_id = Some("wamid.123".to_string());
    let event = store.create_event(new).await.unwrap();

    let since = Utc::now() - Duration::hours(24);
    let found = store
        .find_recent_event_by_source("r1", "wamid.123", since)
        .await
        .unwrap();
    assert_eq!(found, Some(event.id));
    assert!(store
        .find_recent_event_by_source("r1", "wamid.999", since)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn alert_rule_trigger_and_history_lifecycle() {
    let store = memory_store().await;
    let rule = store
        .insert_alert_rule(&AlertRuleRow {
            id: methub_common::id::next_id(),
            workspace_id: "ws1".to_string(),
            name: "dlq watch".to_string(),
            condition_type: "dlq_threshold".to_string(),
            condition_config_json: "{\"threshold\":3}".to_string(),
            notify_channels_json: "[\"in_app\"]".to_string(),
            notify_config_json: "{}".to_string(),
            cooldown_minutes: 10,
            last_triggered_at: None,
            trigger_count: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(rule.trigger_count, 0);

    let fired_at = Utc::now();
    store.record_rule_trigger(&rule.id, fired_at).await.unwrap();
    let reloaded = store.get_alert_rule("ws1", &rule.id).await.unwrap().unwrap();
    assert_eq!(reloaded.trigger_count, 1);
    assert!(reloaded.last_triggered_at.is_some());

    let history = store
        .insert_alert_history(&AlertHistoryRow {
            id: methub_common::id::next_id(),
            workspace_id: "ws1".to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            status: "triggered".to_string(),
            condition_snapshot_json: "{\"dlq_count\":3}".to_string(),
            notified_via_json: "[]".to_string(),
            message: "3 events in DLQ".to_string(),
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_at: None,
            triggered_at: fired_at,
        })
        .await
        .unwrap();

    assert!(store.acknowledge_alert("ws1", &history.id, "user-1").await.unwrap());
    // Second acknowledge is a no-op: status moved on.
    assert!(!store.acknowledge_alert("ws1", &history.id, "user-1").await.unwrap());
    assert!(store.resolve_alert("ws1", &history.id).await.unwrap());

    let row = store.get_alert_history("ws1", &history.id).await.unwrap().unwrap();
    assert_eq!(row.status, "resolved");
    assert_eq!(row.acknowledged_by.as_deref(), Some("user-1"));
    assert!(row.resolved_at.is_some());
}
