use chrono::{Duration, Utc};
use methub_common::types::{LogCategory, LogLevel};
use methub_storage::{MappingRow, NewDeliveryEvent, NewLogEntry, RouteRow};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

/// Default retry budget for events created by the receiver.
const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Validated envelope shape at the HTTP boundary. Anything that does not
/// parse into this is acknowledged and ignored — Meta must get its 200.
#[derive(Debug, Deserialize)]
pub struct MetaEnvelope {
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<MetaEntry>,
}

#[derive(Debug, Deserialize)]
pub struct MetaEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<MetaChange>,
}

#[derive(Debug, Deserialize)]
pub struct MetaChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// What the webhook endpoint reports back to Meta.
#[derive(Debug, serde::Serialize)]
pub struct ReceiveSummary {
    pub status: &'static str,
    pub processed: usize,
    /// Changes that matched a route but could not be enqueued. Non-zero
    /// turns the acknowledgement into a 500 so Meta redelivers.
    #[serde(skip)]
    pub enqueue_failures: usize,
}

/// Process one inbound Meta envelope: match routes, apply mappings,
/// enqueue delivery events and fire their first attempts through the
/// bounded per-workspace pool. Acknowledgement never waits on delivery.
pub async fn process_envelope(state: &AppState, envelope: MetaEnvelope) -> ReceiveSummary {
    let Some(object) = envelope.object.as_deref() else {
        return ReceiveSummary {
            status: "ignored",
            processed: 0,
            enqueue_failures: 0,
        };
    };
    if envelope.entry.is_empty() {
        return ReceiveSummary {
            status: "ignored",
            processed: 0,
            enqueue_failures: 0,
        };
    }

    let mut processed = 0;
    let mut enqueue_failures = 0;
    for entry in &envelope.entry {
        for change in &entry.changes {
            let (created, failed) = process_change(state, object, entry, change).await;
            processed += created;
            enqueue_failures += failed;
        }
    }

    ReceiveSummary {
        status: "ok",
        processed,
        enqueue_failures,
    }
}

async fn process_change(
    state: &AppState,
    object: &str,
    entry: &MetaEntry,
    change: &MetaChange,
) -> (usize, usize) {
    let inbound = match classify(object, change) {
        Some(i) => i,
        None => return (0, 0),
    };

    let routes = match state
        .store
        .resolve_routes_all_workspaces(inbound.source_type, inbound.source_id.as_deref())
        .await
    {
        Ok(routes) => routes,
        Err(e) => {
            tracing::error!(error = %e, "Route resolution failed");
            return (0, 1);
        }
    };

    log_received(state, &routes, &inbound).await;
    if routes.is_empty() {
        return (0, 0);
    }

    // Lead enrichment happens once per change and is shared by all
    // matched routes. Failure is non-fatal: the raw payload goes out.
    let enriched_lead = if inbound.source_type == "forms" {
        fetch_lead_for_routes(state, &routes, &change.value).await
    } else {
        None
    };

    let mut payload = json!({
        "object": object,
        "entry_id": entry.id,
        "field": change.field,
        "value": change.value,
    });
    if let Some(lead) = enriched_lead {
        payload["lead"] = lead;
    }

    let mut created = 0;
    let mut failures = 0;
    for route in routes {
        if !filter_accepts(&route, &inbound.event_kinds) {
            continue;
        }
        if created_recently(state, &route, inbound.source_event_id.as_deref()).await {
            tracing::debug!(
                route_id = %route.id,
                source_event_id = ?inbound.source_event_id,
                "Duplicate provider event, skipping"
            );
            continue;
        }
        match create_event(state, &route, &inbound, &payload).await {
            Ok(event_id) => {
                state
                    .worker
                    .clone()
                    .spawn_first_attempt(event_id, route.workspace_id.clone());
                created += 1;
            }
            Err(e) => {
                tracing::error!(route_id = %route.id, error = %e, "Failed to enqueue delivery event");
                failures += 1;
            }
        }
    }
    (created, failures)
}

/// One classified inbound change: its source kind, channel identifier,
/// provider event id and the event kinds used by route filters.
struct InboundChange {
    source_type: &'static str,
    source_id: Option<String>,
    source_event_id: Option<String>,
    event_kinds: Vec<String>,
}

fn classify(object: &str, change: &MetaChange) -> Option<InboundChange> {
    match object {
        "whatsapp_business_account" => {
            let value = &change.value;
            let source_id = value
                .pointer("/metadata/phone_number_id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());

            let mut event_kinds = Vec::new();
            if value
                .get("messages")
                .and_then(|v| v.as_array())
                .is_some_and(|a| !a.is_empty())
            {
                event_kinds.push("messages".to_string());
            }
            if let Some(statuses) = value.get("statuses").and_then(|v| v.as_array()) {
                for status in statuses {
                    if let Some(kind) = status.get("status").and_then(|v| v.as_str()) {
                        event_kinds.push(format!("status_{kind}"));
                    }
                }
            }

            let source_event_id = value
                .pointer("/messages/0/id")
                .or_else(|| value.pointer("/statuses/0/id"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());

            Some(InboundChange {
                source_type: "whatsapp",
                source_id,
                source_event_id,
                event_kinds,
            })
        }
        "page" if change.field.as_deref() == Some("leadgen") => {
            let value = &change.value;
            Some(InboundChange {
                source_type: "forms",
                source_id: value
                    .get("form_id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                source_event_id: value
                    .get("leadgen_id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                event_kinds: vec!["leadgen".to_string()],
            })
        }
        _ => None,
    }
}

/// A route's filter rules. `null` filter rules, a missing `event_types`
/// key and an empty `event_types` list all accept every event.
fn filter_accepts(route: &RouteRow, event_kinds: &[String]) -> bool {
    let Some(raw) = route.filter_rules_json.as_deref() else {
        return true;
    };
    let Ok(rules) = serde_json::from_str::<Value>(raw) else {
        return true;
    };
    let Some(allowed) = rules.get("event_types").and_then(|v| v.as_array()) else {
        return true;
    };
    if allowed.is_empty() {
        return true;
    }
    event_kinds.iter().any(|kind| {
        allowed
            .iter()
            .any(|a| a.as_str().is_some_and(|s| s == kind))
    })
}

async fn created_recently(
    state: &AppState,
    route: &RouteRow,
    source_event_id: Option<&str>,
) -> bool {
    let window_hours = state.config.delivery.dedupe_window_hours;
    let (Some(seid), true) = (source_event_id, window_hours > 0) else {
        return false;
    };
    let since = Utc::now() - Duration::hours(window_hours as i64);
    match state
        .store
        .find_recent_event_by_source(&route.id, seid, since)
        .await
    {
        Ok(found) => found.is_some(),
        Err(e) => {
            tracing::error!(error = %e, "Dedup lookup failed");
            false
        }
    }
}

async fn create_event(
    state: &AppState,
    route: &RouteRow,
    inbound: &InboundChange,
    payload: &Value,
) -> anyhow::Result<String> {
    let transformed = match &route.mapping_id {
        Some(mapping_id) => apply_route_mapping(state, route, mapping_id, payload).await,
        None => None,
    };

    let new = NewDeliveryEvent {
        workspace_id: route.workspace_id.clone(),
        route_id: route.id.clone(),
        destination_id: route.destination_id.clone(),
        source_type: inbound.source_type.to_string(),
        source_event_id: inbound.source_event_id.clone(),
        payload_json: payload.to_string(),
        transformed_payload_json: transformed,
        max_attempts: DEFAULT_MAX_ATTEMPTS,
        metadata_json: json!({ "event_kinds": inbound.event_kinds }).to_string(),
    };

    let event = state.store.create_event(new).await?;
    Ok(event.id)
}

async fn apply_route_mapping(
    state: &AppState,
    route: &RouteRow,
    mapping_id: &str,
    payload: &Value,
) -> Option<String> {
    let mapping = match state.store.get_mapping(&route.workspace_id, mapping_id).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            // Detached or deleted mapping: pass-through behaviour.
            return None;
        }
        Err(e) => {
            tracing::error!(mapping_id = %mapping_id, error = %e, "Mapping lookup failed");
            return None;
        }
    };

    let def = match mapping_def_from_row(&mapping) {
        Ok(def) => def,
        Err(e) => {
            tracing::warn!(mapping_id = %mapping_id, error = %e, "Mapping row is malformed");
            return None;
        }
    };

    match methub_mapping::apply(&def, payload) {
        Ok(output) => {
            for warning in &output.warnings {
                tracing::debug!(mapping_id = %mapping_id, warning = %warning, "Mapping warning");
            }
            Some(output.output.to_string())
        }
        Err(e) => {
            let entry = NewLogEntry::new(
                &route.workspace_id,
                LogLevel::Warn,
                LogCategory::Mapping,
                "mapping.invalid",
                format!("Mapping '{}' is structurally invalid: {e}", mapping.name),
            )
            .resource(mapping.id.clone());
            if let Err(log_err) = state.store.append_log(entry).await {
                tracing::error!(error = %log_err, "Failed to log mapping failure");
            }
            None
        }
    }
}

/// Build the engine's mapping definition from a stored row.
pub fn mapping_def_from_row(row: &MappingRow) -> anyhow::Result<methub_mapping::MappingDef> {
    let mode = match row.mode.as_str() {
        "template" => methub_mapping::MappingMode::Template,
        _ => methub_mapping::MappingMode::FieldMap,
    };
    let rules: Vec<methub_mapping::MappingRule> = serde_json::from_str(&row.rules_json)?;
    let static_fields: Option<Value> = match row.static_fields_json.trim() {
        "" | "{}" | "null" => None,
        raw => Some(serde_json::from_str(raw)?),
    };
    Ok(methub_mapping::MappingDef {
        mode,
        rules,
        // A stale template on a field_map row must not poison the apply.
        template: match mode {
            methub_mapping::MappingMode::Template => row.template.clone(),
            methub_mapping::MappingMode::FieldMap => None,
        },
        static_fields,
        pass_through: row.pass_through,
    })
}

async fn fetch_lead_for_routes(
    state: &AppState,
    routes: &[RouteRow],
    value: &Value,
) -> Option<Value> {
    let leadgen_id = value.get("leadgen_id").and_then(|v| v.as_str())?;

    // Token preference: a synced page token, else the workspace's user
    // token. The first matched route's workspace owns the integration.
    let workspace_id = &routes.first()?.workspace_id;
    let token = match state.store.get_page_access_token(workspace_id).await {
        Ok(Some(token)) => Some(token),
        _ => match state.store.get_active_integration(workspace_id, "meta").await {
            Ok(Some(integration)) => Some(integration.access_token),
            _ => None,
        },
    }?;

    match state.meta.fetch_lead(leadgen_id, &token).await {
        Ok(lead) => Some(lead),
        Err(e) => {
            tracing::warn!(leadgen_id = %leadgen_id, error = %e, "Lead enrichment failed");
            let entry = NewLogEntry::new(
                workspace_id,
                LogLevel::Warn,
                LogCategory::Webhook,
                "webhook.enrichment_failed",
                format!("Lead {leadgen_id} enrichment failed: {e}"),
            );
            if let Err(log_err) = state.store.append_log(entry).await {
                tracing::error!(error = %log_err, "Failed to log enrichment failure");
            }
            None
        }
    }
}

async fn log_received(state: &AppState, routes: &[RouteRow], inbound: &InboundChange) {
    // One row per workspace that matched; an unmatched change has no
    // tenant to log under and only reaches the tracing output.
    if routes.is_empty() {
        tracing::debug!(
            source_type = inbound.source_type,
            source_id = ?inbound.source_id,
            "Webhook change matched no routes"
        );
        return;
    }

    let mut seen: Vec<&str> = Vec::new();
    for route in routes {
        if seen.contains(&route.workspace_id.as_str()) {
            continue;
        }
        seen.push(&route.workspace_id);
        let matched = routes
            .iter()
            .filter(|r| r.workspace_id == route.workspace_id)
            .count();
        let entry = NewLogEntry::new(
            &route.workspace_id,
            LogLevel::Info,
            LogCategory::Webhook,
            "webhook.received",
            format!(
                "Received {} event ({} route(s) matched)",
                inbound.source_type, matched
            ),
        )
        .metadata(json!({
            "source_id": inbound.source_id,
            "event_kinds": inbound.event_kinds,
            "routes_matched": matched,
        }));
        if let Err(e) = state.store.append_log(entry).await {
            tracing::error!(error = %e, "Failed to write webhook log");
        }
    }
}
