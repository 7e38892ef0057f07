use chrono::{DateTime, Utc};
use std::sync::Arc;

use methub_notify::manager::NotificationManager;
use methub_storage::HubStore;

use crate::config::ServerConfig;
use crate::delivery::worker::DeliveryWorker;
use crate::meta::MetaClient;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HubStore>,
    pub notifier: Arc<NotificationManager>,
    pub worker: Arc<DeliveryWorker>,
    pub meta: Arc<MetaClient>,
    pub config: Arc<ServerConfig>,
    pub jwt_secret: Arc<String>,
    pub start_time: DateTime<Utc>,
}
