mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use methub_storage::{DeliveryEventRow, EventFilter, LogFilter};
use tower::ServiceExt;

use common::*;

async fn post_webhook(app: &axum::Router, envelope: &serde_json::Value) -> StatusCode {
    let body = serde_json::to_vec(envelope).unwrap();
    let signature =
        methub_delivery::signature_header(APP_SECRET.as_bytes(), &body);
    let req = Request::builder()
        .method("POST")
        .uri("/webhook/meta")
        .header("content-type", "application/json")
        .header("x-hub-signature-256", signature)
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(req).await.unwrap().status()
}

async fn wait_for_event(
    state: &methub_server::state::AppState,
    predicate: impl Fn(&DeliveryEventRow) -> bool,
) -> Option<DeliveryEventRow> {
    for _ in 0..40 {
        let events = state
            .store
            .list_events(WORKSPACE, &EventFilter::default(), 10, 0)
            .await
            .unwrap();
        if let Some(event) = events.iter().find(|e| predicate(e)) {
            return Some(event.clone());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    None
}

#[tokio::test]
async fn happy_path_delivers_one_event() {
    let (state, app) = build_state().await;
    let stub = stub_destination(vec![202]).await;

    let dest = state
        .store
        .insert_destination(&destination_row(&stub.url, 5000))
        .await
        .unwrap();
    state
        .store
        .insert_route(&route_row(&dest.id, "whatsapp", None))
        .await
        .unwrap();

    let status = post_webhook(&app, &whatsapp_message_envelope("PN1")).await;
    assert_eq!(status, StatusCode::OK);

    let event = wait_for_event(&state, |e| e.status == "delivered")
        .await
        .expect("event should be delivered within 2s");
    assert_eq!(event.attempts_count, 1);
    assert!(event.delivered_at.is_some());
    assert!(event.next_retry_at.is_none());

    let attempts = state.store.list_attempts(&event.id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].attempt_number, 1);
    assert_eq!(attempts[0].status_code, Some(202));

    let logs = state
        .store
        .list_logs(
            WORKSPACE,
            &LogFilter {
                category_eq: Some("webhook".to_string()),
                ..Default::default()
            },
            10,
            0,
        )
        .await
        .unwrap();
    assert!(logs.iter().any(|l| l.action == "webhook.received"));
}

#[tokio::test]
async fn signature_mismatch_is_rejected() {
    let (_state, app) = build_state().await;

    let body = serde_json::to_vec(&whatsapp_message_envelope("PN1")).unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/webhook/meta")
        .header("content-type", "application/json")
        .header("x-hub-signature-256", "sha256=deadbeef")
        .body(Body::from(body))
        .unwrap();
    let status = app.clone().oneshot(req).await.unwrap().status();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_envelopes_are_acknowledged_and_ignored() {
    let (state, app) = build_state().await;

    for payload in [
        serde_json::json!({}),
        serde_json::json!({"object": "whatsapp_business_account", "entry": []}),
        serde_json::json!({"object": "something_else", "entry": [{"id": "1", "changes": []}]}),
    ] {
        let status = post_webhook(&app, &payload).await;
        assert_eq!(status, StatusCode::OK);
    }

    let events = state
        .store
        .list_events(WORKSPACE, &EventFilter::default(), 10, 0)
        .await
        .unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn filter_rules_suppress_unwanted_event_kinds() {
    let (state, app) = build_state().await;
    let stub = stub_destination(vec![200]).await;

    let dest = state
        .store
        .insert_destination(&destination_row(&stub.url, 5000))
        .await
        .unwrap();
    let mut route = route_row(&dest.id, "whatsapp", None);
    route.filter_rules_json = Some(r#"{"event_types":["messages"]}"#.to_string());
    state.store.insert_route(&route).await.unwrap();

    // A status_read event is filtered out: no delivery event at all.
    let status = post_webhook(&app, &whatsapp_status_envelope("PN1", "read")).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let events = state
        .store
        .list_events(WORKSPACE, &EventFilter::default(), 10, 0)
        .await
        .unwrap();
    assert!(events.is_empty());

    // A message event passes the filter.
    let status = post_webhook(&app, &whatsapp_message_envelope("PN1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(wait_for_event(&state, |_| true).await.is_some());
}

#[tokio::test]
async fn duplicate_provider_events_are_not_forwarded_twice() {
    let (state, app) = build_state().await;
    let stub = stub_destination(vec![200]).await;

    let dest = state
        .store
        .insert_destination(&destination_row(&stub.url, 5000))
        .await
        .unwrap();
    state
        .store
        .insert_route(&route_row(&dest.id, "whatsapp", Some("PN1")))
        .await
        .unwrap();

    // Same wamid delivered twice by Meta.
    post_webhook(&app, &whatsapp_message_envelope("PN1")).await;
    post_webhook(&app, &whatsapp_message_envelope("PN1")).await;

    wait_for_event(&state, |e| e.status == "delivered").await;
    let events = state
        .store
        .list_events(WORKSPACE, &EventFilter::default(), 10, 0)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn challenge_verification() {
    let (_state, app) = build_state().await;

    let req = Request::builder()
        .uri(format!(
            "/webhook/meta?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=12345"
        ))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"12345");

    let req = Request::builder()
        .uri("/webhook/meta?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=12345")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
