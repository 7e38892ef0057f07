mod common;

use chrono::{Duration, Utc};
use methub_common::types::DeliveryStatus;
use methub_storage::{EventPatch, NewDeliveryEvent};

use common::*;

fn new_event(route_id: &str, destination_id: &str) -> NewDeliveryEvent {
    NewDeliveryEvent {
        workspace_id: WORKSPACE.to_string(),
        route_id: route_id.to_string(),
        destination_id: destination_id.to_string(),
        source_type: "whatsapp".to_string(),
        source_event_id: None,
        payload_json: r#"{"hello":"world"}"#.to_string(),
        transformed_payload_json: None,
        max_attempts: 5,
        metadata_json: "{}".to_string(),
    }
}

/// Pull a failed event's retry time into the past so the next cycle
/// picks it up without waiting out the real backoff.
async fn fast_forward_retry(state: &methub_server::state::AppState, event_id: &str) {
    let moved = state
        .store
        .transition(
            event_id,
            &[DeliveryStatus::Failed],
            EventPatch {
                next_retry_at: Some(Some(Utc::now() - Duration::seconds(1))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(moved, "event should be in failed state");
}

#[tokio::test]
async fn retry_until_success() {
    let (state, _app) = build_state().await;
    let stub = stub_destination(vec![500, 500, 200]).await;

    let dest = state
        .store
        .insert_destination(&destination_row(&stub.url, 5000))
        .await
        .unwrap();
    let route = state
        .store
        .insert_route(&route_row(&dest.id, "whatsapp", None))
        .await
        .unwrap();
    let event = state
        .store
        .create_event(new_event(&route.id, &dest.id))
        .await
        .unwrap();

    // Cycle 1: HTTP 500, scheduled for retry with backoff.
    let summary = state.worker.process_cycle().await.unwrap();
    assert_eq!((summary.processed, summary.delivered, summary.failed), (1, 0, 1));
    let after_first = state.store.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(after_first.status, "failed");
    let first_retry = after_first.next_retry_at.unwrap();
    assert!(first_retry > Utc::now());

    // Not yet due: the next cycle claims nothing.
    let idle = state.worker.process_cycle().await.unwrap();
    assert_eq!(idle.processed, 0);

    // Cycle 2 (clock advanced): HTTP 500 again, longer backoff.
    fast_forward_retry(&state, &event.id).await;
    state.worker.process_cycle().await.unwrap();
    let after_second = state.store.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(after_second.status, "failed");
    assert_eq!(after_second.attempts_count, 2);

    // Cycle 3: HTTP 200.
    fast_forward_retry(&state, &event.id).await;
    let summary = state.worker.process_cycle().await.unwrap();
    assert_eq!(summary.delivered, 1);

    let done = state.store.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(done.status, "delivered");
    assert_eq!(done.attempts_count, 3);
    assert!(done.next_retry_at.is_none());
    assert!(done.error_message.is_none());

    let attempts = state.store.list_attempts(&event.id).await.unwrap();
    let codes: Vec<Option<i32>> = attempts.iter().map(|a| a.status_code).collect();
    assert_eq!(codes, vec![Some(500), Some(500), Some(200)]);
    assert!(attempts.iter().all(|a| a.duration_ms >= 0));
    let numbers: Vec<i32> = attempts.iter().map(|a| a.attempt_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn backoff_schedule_is_exponential() {
    let (state, _app) = build_state().await;
    let stub = stub_destination(vec![500]).await;

    let dest = state
        .store
        .insert_destination(&destination_row(&stub.url, 5000))
        .await
        .unwrap();
    let route = state
        .store
        .insert_route(&route_row(&dest.id, "whatsapp", None))
        .await
        .unwrap();
    let event = state
        .store
        .create_event(new_event(&route.id, &dest.id))
        .await
        .unwrap();

    let mut gaps = Vec::new();
    for _ in 0..3 {
        let before = Utc::now();
        state.worker.process_cycle().await.unwrap();
        let row = state.store.get_event(&event.id).await.unwrap().unwrap();
        gaps.push((row.next_retry_at.unwrap() - before).num_milliseconds());
        fast_forward_retry(&state, &event.id).await;
    }

    // Roughly 1, 2, 4 minutes.
    assert!(gaps[0] >= 55_000 && gaps[0] <= 65_000, "gap was {}", gaps[0]);
    assert!(gaps[1] >= 115_000 && gaps[1] <= 125_000, "gap was {}", gaps[1]);
    assert!(gaps[2] >= 235_000 && gaps[2] <= 245_000, "gap was {}", gaps[2]);
}

#[tokio::test]
async fn exhausted_events_land_in_dlq_and_resend_grants_one_attempt() {
    let (state, _app) = build_state().await;
    let stub = stub_destination(vec![500]).await;

    let dest = state
        .store
        .insert_destination(&destination_row(&stub.url, 5000))
        .await
        .unwrap();
    let route = state
        .store
        .insert_route(&route_row(&dest.id, "whatsapp", None))
        .await
        .unwrap();
    let event = state
        .store
        .create_event(new_event(&route.id, &dest.id))
        .await
        .unwrap();

    for cycle in 0..5 {
        let summary = state.worker.process_cycle().await.unwrap();
        assert_eq!(summary.processed, 1, "cycle {cycle} should claim the event");
        let row = state.store.get_event(&event.id).await.unwrap().unwrap();
        if row.status == "failed" {
            fast_forward_retry(&state, &event.id).await;
        }
    }

    let row = state.store.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(row.status, "dlq");
    assert_eq!(row.attempts_count, 5);
    assert!(row.next_retry_at.is_none());
    assert!(row.error_message.is_some());

    // Resend: one extra attempt, still failing, back to dlq at 6/6.
    let outcome = state.worker.resend(&row).await.unwrap();
    assert!(!outcome.success);

    let after = state.store.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(after.attempts_count, 6);
    assert_eq!(after.max_attempts, 6);
    assert_eq!(after.status, "dlq");
    assert_eq!(state.store.list_attempts(&event.id).await.unwrap().len(), 6);
}

#[tokio::test]
async fn resend_after_dlq_can_succeed() {
    let (state, _app) = build_state().await;
    // Fails five times, then recovers.
    let stub = stub_destination(vec![500, 500, 500, 500, 500, 200]).await;

    let dest = state
        .store
        .insert_destination(&destination_row(&stub.url, 5000))
        .await
        .unwrap();
    let route = state
        .store
        .insert_route(&route_row(&dest.id, "whatsapp", None))
        .await
        .unwrap();
    let event = state
        .store
        .create_event(new_event(&route.id, &dest.id))
        .await
        .unwrap();

    for _ in 0..5 {
        state.worker.process_cycle().await.unwrap();
        let row = state.store.get_event(&event.id).await.unwrap().unwrap();
        if row.status == "failed" {
            fast_forward_retry(&state, &event.id).await;
        }
    }
    let row = state.store.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(row.status, "dlq");

    let outcome = state.worker.resend(&row).await.unwrap();
    assert!(outcome.success);
    let after = state.store.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(after.status, "delivered");
    assert_eq!(after.attempts_count, 6);
}

#[tokio::test]
async fn timeouts_are_recorded_without_status_code() {
    let (state, _app) = build_state().await;
    let url = silent_destination().await;

    let dest = state
        .store
        .insert_destination(&destination_row(&url, 1000))
        .await
        .unwrap();
    let route = state
        .store
        .insert_route(&route_row(&dest.id, "whatsapp", None))
        .await
        .unwrap();
    let event = state
        .store
        .create_event(new_event(&route.id, &dest.id))
        .await
        .unwrap();

    state.worker.process_cycle().await.unwrap();

    let attempts = state.store.list_attempts(&event.id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status_code, None);
    assert!(attempts[0]
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("Timeout after 1000ms"));
    assert!(attempts[0].duration_ms >= 1000);

    let row = state.store.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(row.status, "failed");
}

#[tokio::test]
async fn inactive_destination_cancels_event() {
    let (state, _app) = build_state().await;
    let stub = stub_destination(vec![200]).await;

    let mut dest_row = destination_row(&stub.url, 5000);
    dest_row.is_active = false;
    let dest = state.store.insert_destination(&dest_row).await.unwrap();
    let route = state
        .store
        .insert_route(&route_row(&dest.id, "whatsapp", None))
        .await
        .unwrap();
    let event = state
        .store
        .create_event(new_event(&route.id, &dest.id))
        .await
        .unwrap();

    state.worker.process_cycle().await.unwrap();

    let row = state.store.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(row.status, "cancelled");
    assert_eq!(row.error_message.as_deref(), Some("Destination inactive"));
    // No HTTP call was made.
    assert_eq!(stub.hits.load(std::sync::atomic::Ordering::SeqCst), 0);
}
