pub mod consecutive_fails;
pub mod custom;
pub mod dlq_threshold;
pub mod error_rate;
pub mod latency;
pub mod no_events;
