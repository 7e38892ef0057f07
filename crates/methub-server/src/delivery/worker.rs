use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use methub_common::types::{AuthType, DeliveryStatus, LogCategory, LogLevel};
use methub_delivery::client::{AttemptOutcome, DestinationClient, Target};
use methub_delivery::{backoff_ms, sample};
use methub_storage::{AttemptRow, DeliveryEventRow, DestinationRow, EventPatch, HubStore, NewLogEntry};
use serde_json::{json, Value};

use crate::delivery::pool::WorkspacePools;

/// Summary of one `process` cycle.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct CycleSummary {
    pub processed: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Terminal outcome of a resend.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

/// Drives claimed delivery events through the destination client and the
/// retry/DLQ state machine. Shared between the periodic scheduler, the
/// webhook receiver's inline first attempts, and user-initiated
/// resend/test calls.
pub struct DeliveryWorker {
    store: Arc<HubStore>,
    client: DestinationClient,
    pools: WorkspacePools,
    batch_size: u64,
    default_timeout_ms: u64,
}

impl DeliveryWorker {
    pub fn new(
        store: Arc<HubStore>,
        batch_size: u64,
        per_workspace_concurrency: usize,
        default_timeout_ms: u64,
    ) -> Self {
        Self {
            store,
            client: DestinationClient::new(),
            pools: WorkspacePools::new(per_workspace_concurrency),
            batch_size,
            default_timeout_ms,
        }
    }

    /// One worker cycle: claim up to `batch_size` ready events (oldest
    /// first) and attempt each.
    pub async fn process_cycle(&self) -> anyhow::Result<CycleSummary> {
        let claimed = self.store.claim_ready_events(self.batch_size).await?;
        let mut summary = CycleSummary::default();

        for event in claimed {
            summary.processed += 1;
            match self.attempt_claimed(event).await {
                AttemptEnd::Delivered => summary.delivered += 1,
                AttemptEnd::Failed | AttemptEnd::Dlq => summary.failed += 1,
                AttemptEnd::Cancelled | AttemptEnd::Lost => {}
            }
        }
        Ok(summary)
    }

    /// Fire the first attempt for a freshly enqueued event without making
    /// the caller wait. Bounded per workspace; if the inline attempt never
    /// runs, the scheduler picks the event up on its next tick.
    pub fn spawn_first_attempt(self: Arc<Self>, event_id: String, workspace_id: String) {
        let worker = self;
        tokio::spawn(async move {
            let _permit = worker.pools.acquire(&workspace_id).await;
            match worker.store.claim_event(&event_id).await {
                Ok(Some(event)) => {
                    worker.attempt_claimed(event).await;
                }
                Ok(None) => {
                    // Another worker got there first; nothing to do.
                }
                Err(e) => {
                    tracing::error!(event_id = %event_id, error = %e, "Inline claim failed");
                }
            }
        });
    }

    /// User-initiated resend of a `failed`/`dlq` event: back to `pending`
    /// with one extra attempt granted, then one inline attempt.
    pub async fn resend(&self, event: &DeliveryEventRow) -> anyhow::Result<ResendOutcome> {
        let reset = self
            .store
            .transition(
                &event.id,
                &[DeliveryStatus::Failed, DeliveryStatus::Dlq],
                EventPatch {
                    status: Some(DeliveryStatus::Pending),
                    next_retry_at: Some(Some(Utc::now())),
                    error_message: Some(None),
                    // Grant one more attempt, never shrink the budget of an
                    // event that had retries left.
                    max_attempts: Some(event.max_attempts.max(event.attempts_count + 1)),
                    ..Default::default()
                },
            )
            .await?;
        if !reset {
            return Ok(ResendOutcome {
                success: false,
                error: Some("event is not in a resendable state".to_string()),
            });
        }

        let _permit = self.pools.acquire(&event.workspace_id).await;
        let Some(claimed) = self.store.claim_event(&event.id).await? else {
            // Another worker raced us to it; the resend itself succeeded.
            return Ok(ResendOutcome {
                success: true,
                error: None,
            });
        };
        match self.attempt_claimed(claimed).await {
            AttemptEnd::Delivered => Ok(ResendOutcome {
                success: true,
                error: None,
            }),
            _ => {
                let reloaded = self.store.get_event(&event.id).await?;
                Ok(ResendOutcome {
                    success: false,
                    error: reloaded.and_then(|e| e.error_message),
                })
            }
        }
    }

    /// Dry-run call against a destination with the canned sample payload.
    /// Touches neither events nor attempts.
    pub async fn test(&self, destination: &DestinationRow) -> AttemptOutcome {
        let target = self.target_for(destination);
        self.client
            .call(&target, &sample::test_payload(), "test", 1)
            .await
    }

    /// Drive one claimed (status=processing) event through a delivery
    /// attempt and the resulting state transition.
    async fn attempt_claimed(&self, event: DeliveryEventRow) -> AttemptEnd {
        let destination = match self.store.get_destination_by_id(&event.destination_id).await {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Destination lookup failed");
                // Leave the event in processing; the claim stays visible
                // for operators and the next cycle cannot double-send.
                return AttemptEnd::Lost;
            }
        };

        let destination = match destination {
            Some(d) if d.is_active && d.deleted_at.is_none() => d,
            _ => {
                let cancelled = self
                    .store
                    .transition(
                        &event.id,
                        &[DeliveryStatus::Processing],
                        EventPatch {
                            status: Some(DeliveryStatus::Cancelled),
                            next_retry_at: Some(None),
                            error_message: Some(Some("Destination inactive".to_string())),
                            ..Default::default()
                        },
                    )
                    .await;
                if let Err(e) = cancelled {
                    tracing::error!(event_id = %event.id, error = %e, "Cancel transition failed");
                }
                self.log_outcome(
                    &event,
                    LogLevel::Warn,
                    "delivery.cancelled",
                    "Destination inactive, event cancelled",
                    None,
                )
                .await;
                return AttemptEnd::Cancelled;
            }
        };

        let body = self.event_body(&event);
        let target = self.target_for(&destination);
        let outcome = self
            .client
            .call(&target, &body, &event.id, event.attempts_count as u32)
            .await;

        let attempt = AttemptRow {
            id: String::new(),
            workspace_id: event.workspace_id.clone(),
            event_id: event.id.clone(),
            attempt_number: event.attempts_count,
            request_url: target.url.clone(),
            request_method: target.method.clone(),
            status_code: outcome.status_code.map(|c| c as i32),
            response_body: outcome.response_body.clone(),
            error_message: outcome.error_message.clone(),
            duration_ms: outcome.duration_ms,
            attempted_at: Utc::now(),
        };
        if let Err(e) = self.store.append_attempt(attempt).await {
            tracing::error!(event_id = %event.id, error = %e, "Failed to record attempt");
        }

        if outcome.is_success() {
            let ok = self
                .store
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
                .unwrap_or(false);
            if ok {
                self.log_outcome(
                    &event,
                    LogLevel::Info,
                    "delivery.success",
                    format!(
                        "Delivered to {} (HTTP {})",
                        destination.name,
                        outcome.status_code.unwrap_or_default()
                    ),
                    Some(outcome.duration_ms),
                )
                .await;
            }
            return AttemptEnd::Delivered;
        }

        let error_message = outcome.error_message.clone().unwrap_or_else(|| {
            format!("HTTP {}", outcome.status_code.unwrap_or_default())
        });

        if event.attempts_count >= event.max_attempts {
            let moved = self
                .store
                .transition(
                    &event.id,
                    &[DeliveryStatus::Processing],
                    EventPatch {
                        status: Some(DeliveryStatus::Dlq),
                        next_retry_at: Some(None),
                        failed_at: Some(Some(Utc::now())),
                        error_message: Some(Some(error_message.clone())),
                        ..Default::default()
                    },
                )
                .await;
            if let Err(e) = moved {
                tracing::error!(event_id = %event.id, error = %e, "DLQ transition failed");
            }
            self.log_outcome(
                &event,
                LogLevel::Error,
                "delivery.dlq",
                format!(
                    "Exhausted {} attempts to {}: {}",
                    event.attempts_count, destination.name, error_message
                ),
                Some(outcome.duration_ms),
            )
            .await;
            return AttemptEnd::Dlq;
        }

        let delay_ms = backoff_ms(event.attempts_count as u32);
        let next_retry = Utc::now() + Duration::milliseconds(delay_ms as i64);
        let moved = self
            .store
            .transition(
                &event.id,
                &[DeliveryStatus::Processing],
                EventPatch {
                    status: Some(DeliveryStatus::Failed),
                    next_retry_at: Some(Some(next_retry)),
                    failed_at: Some(Some(Utc::now())),
                    error_message: Some(Some(error_message.clone())),
                    ..Default::default()
                },
            )
            .await;
        if let Err(e) = moved {
            tracing::error!(event_id = %event.id, error = %e, "Retry transition failed");
        }
        self.log_outcome(
            &event,
            LogLevel::Warn,
            "delivery.failed",
            format!(
                "Attempt {}/{} to {} failed: {} (retry in {}s)",
                event.attempts_count,
                event.max_attempts,
                destination.name,
                error_message,
                delay_ms / 1000
            ),
            Some(outcome.duration_ms),
        )
        .await;
        AttemptEnd::Failed
    }

    fn event_body(&self, event: &DeliveryEventRow) -> Value {
        let raw = event
            .transformed_payload_json
            .as_deref()
            .unwrap_or(&event.payload_json);
        serde_json::from_str(raw).unwrap_or_else(|_| json!({ "raw": raw }))
    }

    fn target_for(&self, destination: &DestinationRow) -> Target {
        let headers: HashMap<String, String> =
            serde_json::from_str(&destination.headers_json).unwrap_or_default();
        let auth_config: Value =
            serde_json::from_str(&destination.auth_config_json).unwrap_or(json!({}));
        let timeout_ms = if destination.timeout_ms > 0 {
            destination.timeout_ms as u64
        } else {
            self.default_timeout_ms
        };
        Target {
            url: destination.url.clone(),
            method: destination.method.clone(),
            headers,
            auth_type: AuthType::from_str(&destination.auth_type).unwrap_or(AuthType::None),
            auth_config,
            timeout_ms,
        }
    }

    async fn log_outcome(
        &self,
        event: &DeliveryEventRow,
        level: LogLevel,
        action: &str,
        message: impl Into<String>,
        duration_ms: Option<i64>,
    ) {
        let mut entry = NewLogEntry::new(
            &event.workspace_id,
            level,
            LogCategory::Delivery,
            action,
            message,
        )
        .resource(event.id.clone())
        .metadata(json!({
            "destination_id": event.destination_id,
            "route_id": event.route_id,
            "attempt": event.attempts_count,
        }));
        if let Some(ms) = duration_ms {
            entry = entry.duration(ms);
        }
        if let Err(e) = self.store.append_log(entry).await {
            tracing::error!(error = %e, "Failed to write delivery log");
        }
    }
}

enum AttemptEnd {
    Delivered,
    Failed,
    Dlq,
    Cancelled,
    /// The attempt could not run (lookup failure, lost claim); the event
    /// keeps its current state.
    Lost,
}
