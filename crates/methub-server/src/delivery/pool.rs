use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};

/// Per-workspace concurrency limits for inline delivery tasks.
///
/// The webhook receiver fires first attempts without waiting; bounding
/// them per workspace keeps one noisy tenant from starving the rest of
/// the task pool.
pub struct WorkspacePools {
    pools: RwLock<HashMap<String, Arc<Semaphore>>>,
    permits_per_workspace: usize,
}

impl WorkspacePools {
    pub fn new(permits_per_workspace: usize) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            permits_per_workspace: permits_per_workspace.max(1),
        }
    }

    pub async fn acquire(&self, workspace_id: &str) -> OwnedSemaphorePermit {
        let semaphore = {
            let pools = self.pools.read().await;
            pools.get(workspace_id).cloned()
        };
        let semaphore = match semaphore {
            Some(s) => s,
            None => {
                let mut pools = self.pools.write().await;
                pools
                    .entry(workspace_id.to_string())
                    .or_insert_with(|| Arc::new(Semaphore::new(self.permits_per_workspace)))
                    .clone()
            }
        };
        // Semaphores are never closed in this process.
        semaphore
            .acquire_owned()
            .await
            .expect("workspace semaphore closed")
    }
}
