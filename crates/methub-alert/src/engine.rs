use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use methub_common::types::AlertConditionType;
use std::str::FromStr;

use crate::conditions::consecutive_fails::ConsecutiveFailsCondition;
use crate::conditions::custom::CustomCondition;
use crate::conditions::dlq_threshold::DlqThresholdCondition;
use crate::conditions::error_rate::ErrorRateCondition;
use crate::conditions::latency::LatencyThresholdCondition;
use crate::conditions::no_events::NoEventsCondition;
use crate::AlertCondition;

/// Build the condition object for a rule from its stored type and
/// configuration. A malformed configuration is an error the caller logs
/// and isolates; it never stops evaluation of other rules.
pub fn build_condition(
    condition_type: &str,
    config_json: &str,
) -> Result<Box<dyn AlertCondition>> {
    let kind = AlertConditionType::from_str(condition_type)
        .map_err(|e| anyhow::anyhow!("unsupported alert condition: {e}"))?;

    let config: serde_json::Value = if config_json.trim().is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(config_json)?
    };

    let condition: Box<dyn AlertCondition> = match kind {
        AlertConditionType::ErrorRate => {
            Box::new(serde_json::from_value::<ErrorRateCondition>(config)?)
        }
        AlertConditionType::DlqThreshold => {
            Box::new(serde_json::from_value::<DlqThresholdCondition>(config)?)
        }
        AlertConditionType::LatencyThreshold => {
            Box::new(serde_json::from_value::<LatencyThresholdCondition>(config)?)
        }
        AlertConditionType::NoEvents => {
            Box::new(serde_json::from_value::<NoEventsCondition>(config)?)
        }
        AlertConditionType::ConsecutiveFails => {
            Box::new(serde_json::from_value::<ConsecutiveFailsCondition>(config)?)
        }
        AlertConditionType::Custom => Box::new(CustomCondition),
    };
    Ok(condition)
}

/// A rule inside its cooldown window is skipped entirely, including the
/// condition query.
pub fn cooldown_active(
    last_triggered_at: Option<DateTime<Utc>>,
    cooldown_minutes: i32,
    now: DateTime<Utc>,
) -> bool {
    match last_triggered_at {
        Some(last) => now - last < Duration::minutes(cooldown_minutes.max(1) as i64),
        None => false,
    }
}
