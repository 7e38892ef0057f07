mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use tower::ServiceExt;

use methub_common::types::DeliveryStatus;
use methub_server::alerts::scheduler::AlertScheduler;
use methub_storage::{AlertRuleRow, EventPatch, NewDeliveryEvent};

use common::*;

fn dlq_rule(cooldown_minutes: i32) -> AlertRuleRow {
    AlertRuleRow {
        id: methub_common::id::next_id(),
        workspace_id: WORKSPACE.to_string(),
        name: "dlq watch".to_string(),
        condition_type: "dlq_threshold".to_string(),
        condition_config_json: r#"{"threshold":3}"#.to_string(),
        notify_channels_json: r#"["in_app"]"#.to_string(),
        notify_config_json: "{}".to_string(),
        cooldown_minutes,
        last_triggered_at: None,
        trigger_count: 0,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

async fn push_dlq_events(state: &methub_server::state::AppState, count: usize) {
    for _ in 0..count {
        let event = state
            .store
            .create_event(NewDeliveryEvent {
                workspace_id: WORKSPACE.to_string(),
                route_id: "r1".to_string(),
                destination_id: "d1".to_string(),
                source_type: "whatsapp".to_string(),
                source_event_id: None,
                payload_json: "{}".to_string(),
                transformed_payload_json: None,
                max_attempts: 5,
                metadata_json: "{}".to_string(),
            })
            .await
            .unwrap();
        state.store.claim_event(&event.id).await.unwrap();
        state
            .store
            .transition(
                &event.id,
                &[DeliveryStatus::Processing],
                EventPatch {
                    status: Some(DeliveryStatus::Dlq),
                    next_retry_at: Some(None),
                    error_message: Some(Some("HTTP 500".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn dlq_threshold_fires_once_and_respects_cooldown() {
    let (state, _app) = build_state().await;
    let scheduler = AlertScheduler::new(state.store.clone(), state.notifier.clone(), 60);

    let rule = state.store.insert_alert_rule(&dlq_rule(10)).await.unwrap();
    push_dlq_events(&state, 3).await;

    // First tick: one firing.
    let summary = scheduler.evaluate_all().await.unwrap();
    assert_eq!((summary.evaluated, summary.fired, summary.errored), (1, 1, 0));

    let history = state
        .store
        .list_alert_history(WORKSPACE, None, 10, 0)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, "triggered");
    let snapshot: serde_json::Value =
        serde_json::from_str(&history[0].condition_snapshot_json).unwrap();
    assert_eq!(snapshot["dlq_count"], 3);
    assert_eq!(history[0].notified_via_json, r#"["in_app"]"#);

    let reloaded = state.store.get_alert_rule(WORKSPACE, &rule.id).await.unwrap().unwrap();
    assert_eq!(reloaded.trigger_count, 1);

    // Second tick one minute later: still in cooldown, no new row.
    let summary = scheduler.evaluate_all().await.unwrap();
    assert_eq!(summary.fired, 0);
    assert_eq!(
        state
            .store
            .list_alert_history(WORKSPACE, None, 10, 0)
            .await
            .unwrap()
            .len(),
        1
    );

    // Cooldown expired (stamp the trigger 11 minutes into the past) and
    // more dlq events: a second firing.
    state
        .store
        .record_rule_trigger(&rule.id, Utc::now() - Duration::minutes(11))
        .await
        .unwrap();
    push_dlq_events(&state, 3).await;
    let summary = scheduler.evaluate_all().await.unwrap();
    assert_eq!(summary.fired, 1);
    assert_eq!(
        state
            .store
            .list_alert_history(WORKSPACE, None, 10, 0)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn broken_rule_does_not_block_others() {
    let (state, _app) = build_state().await;
    let scheduler = AlertScheduler::new(state.store.clone(), state.notifier.clone(), 60);

    let mut broken = dlq_rule(10);
    broken.id = methub_common::id::next_id();
    broken.name = "broken".to_string();
    broken.condition_config_json = r#"{"threshold":"three"}"#.to_string();
    state.store.insert_alert_rule(&broken).await.unwrap();
    state.store.insert_alert_rule(&dlq_rule(10)).await.unwrap();
    push_dlq_events(&state, 3).await;

    let summary = scheduler.evaluate_all().await.unwrap();
    assert_eq!(summary.evaluated, 2);
    assert_eq!(summary.errored, 1);
    assert_eq!(summary.fired, 1);

    // The failure itself is visible in the log sink.
    let logs = state
        .store
        .list_logs(
            WORKSPACE,
            &methub_storage::LogFilter {
                level_eq: Some("error".to_string()),
                category_eq: Some("alert".to_string()),
                ..Default::default()
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, "alert.evaluation_failed");
}

#[tokio::test]
async fn acknowledge_and_resolve_over_http() {
    let (state, app) = build_state().await;
    let scheduler = AlertScheduler::new(state.store.clone(), state.notifier.clone(), 60);

    state.store.insert_alert_rule(&dlq_rule(10)).await.unwrap();
    push_dlq_events(&state, 3).await;
    scheduler.evaluate_all().await.unwrap();

    let history = state
        .store
        .list_alert_history(WORKSPACE, None, 10, 0)
        .await
        .unwrap();
    let alert_id = history[0].id.clone();

    let ack = Request::builder()
        .method("POST")
        .uri("/alerts/acknowledge")
        .header("content-type", "application/json")
        .header("authorization", bearer())
        .body(Body::from(
            serde_json::json!({ "alert_id": alert_id }).to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(ack).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Double acknowledge conflicts.
    let ack = Request::builder()
        .method("POST")
        .uri("/alerts/acknowledge")
        .header("content-type", "application/json")
        .header("authorization", bearer())
        .body(Body::from(
            serde_json::json!({ "alert_id": alert_id }).to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(ack).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resolve = Request::builder()
        .method("POST")
        .uri("/alerts/resolve")
        .header("content-type", "application/json")
        .header("authorization", bearer())
        .body(Body::from(
            serde_json::json!({ "alert_id": alert_id }).to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(resolve).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let row = state
        .store
        .get_alert_history(WORKSPACE, &alert_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "resolved");
    assert_eq!(row.acknowledged_by.as_deref(), Some(USER));
    assert!(row.resolved_at.is_some());
}
