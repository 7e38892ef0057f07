mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn protected_endpoints_require_a_session() {
    let (_state, app) = build_state().await;

    let req = Request::builder()
        .method("POST")
        .uri("/delivery/process")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method("POST")
        .uri("/delivery/process")
        .header("authorization", "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn membership_is_checked_per_workspace() {
    let (_state, app) = build_state().await;

    // Valid session, but the caller is not a member of this workspace.
    let req = Request::builder()
        .uri("/destinations?workspace_id=someone-elses-workspace")
        .header("authorization", bearer())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = Request::builder()
        .uri(format!("/destinations?workspace_id={WORKSPACE}"))
        .header("authorization", bearer())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn transform_preview_round_trip() {
    let (_state, app) = build_state().await;

    let body = serde_json::json!({
        "mode": "field_map",
        "pass_through": false,
        "payload": {"contact": {"name": "Ada", "phone": "+49 (151) 123"}},
        "rules": [
            {"source_path": "contact.name", "target_path": "lead.name", "transform": "uppercase"},
            {"source_path": "contact.phone", "target_path": "lead.phone", "transform": "phone_clean"}
        ],
        "static_fields": {"source": "hub"}
    });

    let req = Request::builder()
        .method("POST")
        .uri("/transform/preview")
        .header("content-type", "application/json")
        .header("authorization", bearer())
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["data"]["success"], true);
    assert_eq!(parsed["data"]["output"]["lead"]["name"], "ADA");
    assert_eq!(parsed["data"]["output"]["lead"]["phone"], "+49151123");
    assert_eq!(parsed["data"]["output"]["source"], "hub");
}

#[tokio::test]
async fn destination_crud_and_test_call() {
    let (state, app) = build_state().await;
    let stub = stub_destination(vec![204]).await;

    // Create.
    let body = serde_json::json!({
        "workspace_id": WORKSPACE,
        "name": "crm",
        "url": stub.url,
        "timeout_ms": 100,  // clamped up to 1000
    });
    let req = Request::builder()
        .method("POST")
        .uri("/destinations")
        .header("content-type", "application/json")
        .header("authorization", bearer())
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let dest_id = parsed["data"]["id"].as_str().unwrap().to_string();

    let stored = state
        .store
        .get_destination(WORKSPACE, &dest_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.timeout_ms, 1000);

    // Bad URL is rejected.
    let body = serde_json::json!({
        "workspace_id": WORKSPACE,
        "name": "broken",
        "url": "not a url",
    });
    let req = Request::builder()
        .method("POST")
        .uri("/destinations")
        .header("content-type", "application/json")
        .header("authorization", bearer())
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Dry-run test call hits the stub and reports the status.
    let body = serde_json::json!({ "destination_id": dest_id });
    let req = Request::builder()
        .method("POST")
        .uri("/delivery/test")
        .header("content-type", "application/json")
        .header("authorization", bearer())
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["data"]["success"], true);
    assert_eq!(parsed["data"]["status_code"], 204);
    assert_eq!(stub.hits.load(std::sync::atomic::Ordering::SeqCst), 1);
}
