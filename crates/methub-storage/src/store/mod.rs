use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

pub mod alert;
pub mod destination;
pub mod event;
pub mod integration;
pub mod log;
pub mod mapping;
pub mod member;
pub mod route;
pub mod stats;

/// Unified access layer for the hub database.
///
/// All methods are `async fn` over SeaORM + SQLite. Delivery-event state
/// transitions are conditional updates keyed on the expected current
/// status; a transition that affects zero rows means another worker got
/// there first.
pub struct HubStore {
    pub(crate) db: DatabaseConnection,
}

impl HubStore {
    /// Connect to the database and run all pending migrations.
    pub async fn connect(db_url: &str) -> Result<Self> {
        let db = Database::connect(db_url).await?;

        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;

        tracing::info!(url = %redact(db_url), "Initialized hub store");
        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

// Strip userinfo from a DSN before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
