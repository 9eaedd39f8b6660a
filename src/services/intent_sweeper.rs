use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use crate::ports::IntentStore;

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Periodically drops expired pending intents. Runs until the task is aborted.
pub async fn run_intent_sweeper(intents: Arc<dyn IntentStore>, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Intent sweeper started");

    loop {
        sleep(interval).await;
        sweep_once(intents.as_ref()).await;
    }
}

/// One purge pass. Store errors are logged and the count reported as zero.
pub async fn sweep_once(intents: &dyn IntentStore) -> usize {
    match intents.purge_expired().await {
        Ok(0) => 0,
        Ok(purged) => {
            debug!(purged, "Expired payment intents purged");
            purged
        }
        Err(e) => {
            error!(error = %e, "Intent sweep failed");
            0
        }
    }
}
