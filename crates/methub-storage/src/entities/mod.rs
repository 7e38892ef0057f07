pub mod alert_history;
pub mod alert_rule;
pub mod delivery_attempt;
pub mod delivery_event;
pub mod destination;
pub mod event_log;
pub mod integration;
pub mod mapping;
pub mod meta_resource;
pub mod route;
pub mod workspace_member;
