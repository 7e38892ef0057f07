use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS workspace_members (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'member',
    created_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_members_ws_user ON workspace_members(workspace_id, user_id);

CREATE TABLE IF NOT EXISTS destinations (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    method TEXT NOT NULL DEFAULT 'POST',
    headers_json TEXT NOT NULL DEFAULT '{}',
    auth_type TEXT NOT NULL DEFAULT 'none',
    auth_config_json TEXT NOT NULL DEFAULT '{}',
    timeout_ms INTEGER NOT NULL DEFAULT 10000,
    is_active INTEGER NOT NULL DEFAULT 1,
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_destinations_ws ON destinations(workspace_id);

CREATE TABLE IF NOT EXISTS mappings (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    name TEXT NOT NULL,
    mode TEXT NOT NULL DEFAULT 'field_map',
    rules_json TEXT NOT NULL DEFAULT '[]',
    template TEXT,
    static_fields_json TEXT NOT NULL DEFAULT '{}',
    pass_through INTEGER NOT NULL DEFAULT 0,
    source_type TEXT NOT NULL DEFAULT 'any',
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_mappings_ws ON mappings(workspace_id);

CREATE TABLE IF NOT EXISTS routes (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    source_type TEXT NOT NULL,
    source_id TEXT,
    destination_id TEXT NOT NULL,
    mapping_id TEXT,
    filter_rules_json TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_routes_ws_source ON routes(workspace_id, source_type);
CREATE INDEX IF NOT EXISTS idx_routes_destination ON routes(destination_id);

CREATE TABLE IF NOT EXISTS delivery_events (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    route_id TEXT NOT NULL,
    destination_id TEXT NOT NULL,
    source_type TEXT NOT NULL,
    source_event_id TEXT,
    payload_json TEXT NOT NULL,
    transformed_payload_json TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts_count INTEGER NOT NULL DEFAULT 0,
    max_attempts INTEGER NOT NULL DEFAULT 5,
    next_retry_at TEXT,
    delivered_at TEXT,
    failed_at TEXT,
    error_message TEXT,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_status_retry ON delivery_events(status, next_retry_at);
CREATE INDEX IF NOT EXISTS idx_events_ws_created ON delivery_events(workspace_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_events_route_source ON delivery_events(route_id, source_event_id);

CREATE TABLE IF NOT EXISTS delivery_attempts (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    event_id TEXT NOT NULL,
    attempt_number INTEGER NOT NULL,
    request_url TEXT NOT NULL,
    request_method TEXT NOT NULL,
    status_code INTEGER,
    response_body TEXT,
    error_message TEXT,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    attempted_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attempts_event ON delivery_attempts(event_id, attempt_number);
CREATE INDEX IF NOT EXISTS idx_attempts_ws_time ON delivery_attempts(workspace_id, attempted_at DESC);

CREATE TABLE IF NOT EXISTS event_logs (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    level TEXT NOT NULL DEFAULT 'info',
    category TEXT NOT NULL,
    action TEXT NOT NULL,
    message TEXT NOT NULL,
    resource_id TEXT,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    duration_ms INTEGER,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_logs_ws_created ON event_logs(workspace_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_logs_category ON event_logs(category);

CREATE TABLE IF NOT EXISTS alert_rules (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    name TEXT NOT NULL,
    condition_type TEXT NOT NULL,
    condition_config_json TEXT NOT NULL DEFAULT '{}',
    notify_channels_json TEXT NOT NULL DEFAULT '[\"in_app\"]',
    notify_config_json TEXT NOT NULL DEFAULT '{}',
    cooldown_minutes INTEGER NOT NULL DEFAULT 60,
    last_triggered_at TEXT,
    trigger_count INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_rules_ws ON alert_rules(workspace_id);

CREATE TABLE IF NOT EXISTS alert_history (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    rule_id TEXT NOT NULL,
    rule_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'triggered',
    condition_snapshot_json TEXT NOT NULL DEFAULT '{}',
    notified_via_json TEXT NOT NULL DEFAULT '[]',
    message TEXT NOT NULL,
    acknowledged_by TEXT,
    acknowledged_at TEXT,
    resolved_at TEXT,
    triggered_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alert_history_ws ON alert_history(workspace_id, triggered_at DESC);
CREATE INDEX IF NOT EXISTS idx_alert_history_rule ON alert_history(rule_id);

CREATE TABLE IF NOT EXISTS integrations (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    provider TEXT NOT NULL DEFAULT 'meta',
    access_token TEXT NOT NULL,
    token_expires_at TEXT,
    scopes_json TEXT NOT NULL DEFAULT '[]',
    connected_by TEXT NOT NULL,
    last_synced_at TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_integrations_ws ON integrations(workspace_id, provider);

CREATE TABLE IF NOT EXISTS meta_resources (
    id TEXT PRIMARY KEY NOT NULL,
    workspace_id TEXT NOT NULL,
    integration_id TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    metadata_json TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_meta_resources_ws_type ON meta_resources(workspace_id, resource_type);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS meta_resources;
DROP TABLE IF EXISTS integrations;
DROP TABLE IF EXISTS alert_history;
DROP TABLE IF EXISTS alert_rules;
DROP TABLE IF EXISTS event_logs;
DROP TABLE IF EXISTS delivery_attempts;
DROP TABLE IF EXISTS delivery_events;
DROP TABLE IF EXISTS routes;
DROP TABLE IF EXISTS mappings;
DROP TABLE IF EXISTS destinations;
DROP TABLE IF EXISTS workspace_members;
";
