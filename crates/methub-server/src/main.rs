use anyhow::Result;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use methub_notify::manager::NotificationManager;
use methub_notify::plugin::ChannelRegistry;
use methub_storage::HubStore;

use methub_server::alerts::scheduler::AlertScheduler;
use methub_server::app;
use methub_server::config::ServerConfig;
use methub_server::delivery::scheduler::DeliveryScheduler;
use methub_server::delivery::worker::DeliveryWorker;
use methub_server::meta::MetaClient;
use methub_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install default CryptoProvider: {e:?}"))?;

    methub_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("methub=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/server.toml".to_string());
    let config = ServerConfig::load(&config_path)?;
    config.validate()?;

    tracing::info!(
        http_port = config.http_port,
        db = %config.database.url,
        "methub-server starting"
    );

    let store = Arc::new(HubStore::connect(&config.database.url).await?);

    let notifier = Arc::new(NotificationManager::new(
        ChannelRegistry::default(),
        store.clone(),
    ));

    let worker = Arc::new(DeliveryWorker::new(
        store.clone(),
        config.delivery.batch_size,
        config.delivery.per_workspace_concurrency,
        config.delivery.default_timeout_ms,
    ));

    let meta = Arc::new(MetaClient::new(&config.meta));

    let jwt_secret = match &config.auth.jwt_secret {
        Some(secret) => Arc::new(secret.clone()),
        None => {
            tracing::warn!(
                "No jwt_secret configured. A random secret was generated and will change on restart. Set [auth].jwt_secret in config for production use."
            );
            Arc::new(random_secret())
        }
    };

    let state = AppState {
        store: store.clone(),
        notifier: notifier.clone(),
        worker: worker.clone(),
        meta,
        config: Arc::new(config.clone()),
        jwt_secret,
        start_time: Utc::now(),
    };

    // Delivery scheduler: periodic retry/DLQ processing.
    let delivery_scheduler = DeliveryScheduler::new(worker.clone(), config.delivery.tick_secs);
    let delivery_handle = tokio::spawn(async move {
        delivery_scheduler.run().await;
    });

    // Alert evaluator.
    let alert_scheduler = AlertScheduler::new(store.clone(), notifier.clone(), config.alert.tick_secs);
    let alert_handle = tokio::spawn(async move {
        alert_scheduler.run().await;
    });

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(listener, app::build_http_app(state));

    tracing::info!(http = %http_addr, "Server started");

    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    delivery_handle.abort();
    alert_handle.abort();
    tracing::info!("Server stopped");

    Ok(())
}

fn random_secret() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
