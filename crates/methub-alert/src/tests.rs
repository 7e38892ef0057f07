use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::engine::{build_condition, cooldown_active};
use crate::{EventWindow, StatsProvider};

/// Fixed-value provider for exercising conditions without a database.
#[derive(Default)]
struct FixedStats {
    window: EventWindow,
    dlq: u64,
    created: u64,
    outcomes: Vec<bool>,
}

#[async_trait]
impl StatsProvider for FixedStats {
    async fn event_window(&self, _ws: &str, _minutes: u32) -> Result<EventWindow> {
        Ok(self.window.clone())
    }

    async fn dlq_count(&self, _ws: &str) -> Result<u64> {
        Ok(self.dlq)
    }

    async fn events_created(&self, _ws: &str, _minutes: u32) -> Result<u64> {
        Ok(self.created)
    }

    async fn recent_attempt_outcomes(&self, _ws: &str, limit: u32) -> Result<Vec<bool>> {
        Ok(self.outcomes.iter().copied().take(limit as usize).collect())
    }
}

#[tokio::test]
async fn error_rate_fires_at_threshold_and_needs_events() {
    let condition = build_condition("error_rate", r#"{"threshold_pct": 50, "window_minutes": 30}"#)
        .unwrap();

    let stats = FixedStats {
        window: EventWindow {
            total: 4,
            failed_or_dlq: 2,
            delivered: 2,
            avg_latency_ms: None,
        },
        ..Default::default()
    };
    let hit = condition.evaluate("ws1", &stats).await.unwrap().unwrap();
    assert_eq!(hit.snapshot["error_rate_pct"], 50.0);
    assert_eq!(hit.snapshot["failed_events"], 2);

    // Below threshold: quiet.
    let stats = FixedStats {
        window: EventWindow {
            total: 10,
            failed_or_dlq: 1,
            delivered: 9,
            avg_latency_ms: None,
        },
        ..Default::default()
    };
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_none());

    // No events at all: quiet even though 0/0 would be "all failed".
    let stats = FixedStats::default();
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_none());
}

#[tokio::test]
async fn dlq_threshold_counts_inclusive() {
    let condition = build_condition("dlq_threshold", r#"{"threshold": 3}"#).unwrap();

    let stats = FixedStats {
        dlq: 3,
        ..Default::default()
    };
    let hit = condition.evaluate("ws1", &stats).await.unwrap().unwrap();
    assert_eq!(hit.snapshot["dlq_count"], 3);

    let stats = FixedStats {
        dlq: 2,
        ..Default::default()
    };
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_none());
}

#[tokio::test]
async fn latency_requires_delivered_events() {
    let condition =
        build_condition("latency_threshold", r#"{"threshold_ms": 1000}"#).unwrap();

    let stats = FixedStats {
        window: EventWindow {
            total: 5,
            failed_or_dlq: 0,
            delivered: 5,
            avg_latency_ms: Some(1500.0),
        },
        ..Default::default()
    };
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_some());

    let stats = FixedStats::default();
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_none());
}

#[tokio::test]
async fn no_events_fires_only_on_silence() {
    let condition = build_condition("no_events", r#"{"minutes": 15}"#).unwrap();

    let stats = FixedStats::default();
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_some());

    let stats = FixedStats {
        created: 1,
        ..Default::default()
    };
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_none());
}

#[tokio::test]
async fn consecutive_fails_needs_a_full_failing_run() {
    let condition = build_condition("consecutive_fails", r#"{"threshold": 3}"#).unwrap();

    let stats = FixedStats {
        outcomes: vec![false, false, false],
        ..Default::default()
    };
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_some());

    // One success inside the run breaks it.
    let stats = FixedStats {
        outcomes: vec![false, true, false],
        ..Default::default()
    };
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_none());

    // Too few attempts recorded.
    let stats = FixedStats {
        outcomes: vec![false, false],
        ..Default::default()
    };
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_none());
}

#[tokio::test]
async fn custom_condition_never_fires() {
    let condition = build_condition("custom", r#"{"anything": "goes"}"#).unwrap();
    let stats = FixedStats {
        dlq: 1000,
        created: 1000,
        ..Default::default()
    };
    assert!(condition.evaluate("ws1", &stats).await.unwrap().is_none());
}

#[test]
fn unknown_condition_type_is_an_error() {
    assert!(build_condition("bogus", "{}").is_err());
    // A malformed config is isolated per rule, surfaced as an error.
    assert!(build_condition("dlq_threshold", r#"{"threshold": "three"}"#).is_err());
}

#[test]
fn cooldown_window_suppresses_reevaluation() {
    let now = Utc::now();
    assert!(!cooldown_active(None, 10, now));
    assert!(cooldown_active(Some(now - Duration::minutes(5)), 10, now));
    assert!(!cooldown_active(Some(now - Duration::minutes(11)), 10, now));
}
