use std::sync::Arc;

use tokio::time::{interval, Duration};

use crate::delivery::worker::DeliveryWorker;

/// Periodic driver for the delivery worker. Runs the same `process`
/// cycle the `/delivery/process` endpoint exposes.
pub struct DeliveryScheduler {
    worker: Arc<DeliveryWorker>,
    tick_secs: u64,
}

impl DeliveryScheduler {
    pub fn new(worker: Arc<DeliveryWorker>, tick_secs: u64) -> Self {
        Self { worker, tick_secs }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "Delivery scheduler started");

        let mut tick = interval(Duration::from_secs(self.tick_secs.max(1)));
        loop {
            tick.tick().await;
            match self.worker.process_cycle().await {
                Ok(summary) if summary.processed > 0 => {
                    tracing::info!(
                        processed = summary.processed,
                        delivered = summary.delivered,
                        failed = summary.failed,
                        "Delivery cycle finished"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Delivery cycle failed");
                }
            }
        }
    }
}
