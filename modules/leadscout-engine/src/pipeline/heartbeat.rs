//! Background liveness task: bumps the campaign's `updated_at` on an
//! interval so external watchdogs can recycle zombie executors.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use leadscout_store::Repository;

/// Aborts the heartbeat task when dropped, so it cannot outlive the
/// executor regardless of which path the pipeline exits through.
pub struct HeartbeatGuard {
    handle: JoinHandle<()>,
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.handle.abort();
        debug!("Heartbeat stopped");
    }
}

/// Start the heartbeat for a running campaign.
pub fn spawn_heartbeat(repo: Repository, campaign_id: Uuid, interval: Duration) -> HeartbeatGuard {
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it, the row was just touched.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            repo.touch_heartbeat(campaign_id).await;
            debug!(campaign_id = %campaign_id, "Heartbeat");
        }
    });
    HeartbeatGuard { handle }
}
