#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::any;
use axum::Router;
use chrono::Utc;

use methub_notify::manager::NotificationManager;
use methub_notify::plugin::ChannelRegistry;
use methub_server::app;
use methub_server::auth::create_token;
use methub_server::config::ServerConfig;
use methub_server::delivery::worker::DeliveryWorker;
use methub_server::meta::MetaClient;
use methub_server::state::AppState;
use methub_storage::{DestinationRow, HubStore, RouteRow};

pub const WORKSPACE: &str = "ws-test";
pub const USER: &str = "user-1";
pub const JWT_SECRET: &str = "test-secret";
pub const VERIFY_TOKEN: &str = "verify-token";
pub const APP_SECRET: &str = "app-secret";

/// In-memory store + full HTTP app with one seeded workspace member.
pub async fn build_state() -> (AppState, Router) {
    let mut config = ServerConfig::default();
    config.meta.app_id = "app-id".to_string();
    config.meta.app_secret = APP_SECRET.to_string();
    config.meta.webhook_verify_token = VERIFY_TOKEN.to_string();
    config.auth.jwt_secret = Some(JWT_SECRET.to_string());
    config.delivery.dedupe_window_hours = 24;

    let store = Arc::new(HubStore::connect("sqlite::memory:").await.unwrap());
    store.add_member(WORKSPACE, USER, "admin").await.unwrap();

    let notifier = Arc::new(NotificationManager::new(
        ChannelRegistry::default(),
        store.clone(),
    ));
    let worker = Arc::new(DeliveryWorker::new(
        store.clone(),
        config.delivery.batch_size,
        config.delivery.per_workspace_concurrency,
        config.delivery.default_timeout_ms,
    ));
    let meta = Arc::new(MetaClient::new(&config.meta));

    let state = AppState {
        store,
        notifier,
        worker,
        meta,
        config: Arc::new(config),
        jwt_secret: Arc::new(JWT_SECRET.to_string()),
        start_time: Utc::now(),
    };
    let router = app::build_http_app(state.clone());
    (state, router)
}

pub fn bearer() -> String {
    format!(
        "Bearer {}",
        create_token(JWT_SECRET, USER, 3600).unwrap()
    )
}

/// Scripted HTTP destination: answers with the queued status codes in
/// order, repeating the last one when the script runs out.
pub struct StubDestination {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
}

pub async fn stub_destination(codes: Vec<u16>) -> StubDestination {
    let hits = Arc::new(AtomicUsize::new(0));
    let script = Arc::new(Mutex::new(VecDeque::from(codes)));
    let last = Arc::new(AtomicUsize::new(200));

    let handler_hits = hits.clone();
    let handler = move || {
        let script = script.clone();
        let last = last.clone();
        let hits = handler_hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            let code = {
                let mut script = script.lock().unwrap();
                match script.pop_front() {
                    Some(code) => {
                        last.store(code as usize, Ordering::SeqCst);
                        code
                    }
                    None => last.load(Ordering::SeqCst) as u16,
                }
            };
            (
                axum::http::StatusCode::from_u16(code).unwrap(),
                "stub response",
            )
        }
    };

    let router = Router::new().fallback(any(handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    StubDestination {
        url: format!("http://{addr}/hook"),
        hits,
    }
}

/// A destination that accepts connections but never answers.
pub async fn silent_destination() -> String {
    let router = Router::new().fallback(any(|| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        "too late"
    }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{addr}/hook")
}

pub fn destination_row(url: &str, timeout_ms: i32) -> DestinationRow {
    DestinationRow {
        id: methub_common::id::next_id(),
        workspace_id: WORKSPACE.to_string(),
        name: "stub".to_string(),
        url: url.to_string(),
        method: "POST".to_string(),
        headers_json: "{}".to_string(),
        auth_type: "none".to_string(),
        auth_config_json: "{}".to_string(),
        timeout_ms,
        is_active: true,
        deleted_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn route_row(destination_id: &str, source_type: &str, source_id: Option<&str>) -> RouteRow {
    RouteRow {
        id: methub_common::id::next_id(),
        workspace_id: WORKSPACE.to_string(),
        source_type: source_type.to_string(),
        source_id: source_id.map(|s| s.to_string()),
        destination_id: destination_id.to_string(),
        mapping_id: None,
        filter_rules_json: None,
        priority: 0,
        is_active: true,
        deleted_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// WhatsApp message envelope with the given phone number id.
pub fn whatsapp_message_envelope(phone_number_id: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": { "phone_number_id": phone_number_id },
                    "messages": [{
                        "from": "15550001111",
                        "id": "wamid.msg-1",
                        "type": "text",
                        "text": { "body": "hello" }
                    }]
                }
            }]
        }]
    })
}

/// WhatsApp status envelope (e.g. `status_read`).
pub fn whatsapp_status_envelope(phone_number_id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": { "phone_number_id": phone_number_id },
                    "statuses": [{
                        "id": "wamid.status-1",
                        "status": status,
                        "recipient_id": "15550001111"
                    }]
                }
            }]
        }]
    })
}
