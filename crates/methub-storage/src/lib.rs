//! Durable state for the integration hub: destinations, routes, mappings,
//! the delivery event/attempt state machine, the append-only event log,
//! alert rules and history, and Meta integration inventory.
//!
//! All access goes through [`HubStore`], a SeaORM + SQLite facade whose
//! method signatures are the repository operations the pipeline needs.
//! State transitions on delivery events use conditional updates keyed on
//! the expected current status (optimistic concurrency).

pub mod entities;
pub mod store;

#[cfg(test)]
mod tests;

pub use store::alert::{AlertHistoryRow, AlertRuleRow, AlertRuleUpdate};
pub use store::destination::{DestinationRow, DestinationUpdate};
pub use store::event::{
    AttemptRow, DeliveryEventRow, DeliveryStats, EventFilter, EventPatch, NewDeliveryEvent,
};
pub use store::integration::{IntegrationRow, MetaResourceRow};
pub use store::log::{EventLogRow, LogFilter, NewLogEntry};
pub use store::mapping::MappingRow;
pub use store::route::{RouteRow, RouteUpdate};
pub use store::HubStore;
