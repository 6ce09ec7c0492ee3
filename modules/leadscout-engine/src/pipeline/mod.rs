pub mod copy_phase;
pub mod executor;
pub mod heartbeat;
pub mod map_phase;
pub mod professional_phase;
pub mod social_phase;

pub use executor::{CampaignSummary, PipelineExecutor};

use std::time::Duration;

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use leadscout_common::CampaignStatus;
use leadscout_store::Repository;

/// How often a suspended campaign re-checks its status.
const PAUSE_POLL: Duration = Duration::from_secs(5);

/// Re-read campaign status between batches. `Paused` suspends here until
/// the campaign runs again; a terminal status aborts the phase.
pub(crate) async fn check_control(repo: &Repository, campaign_id: Uuid) -> Result<()> {
    loop {
        let campaign = repo.get_campaign(campaign_id).await?;
        match campaign.status() {
            CampaignStatus::Running => return Ok(()),
            CampaignStatus::Paused => {
                info!(campaign_id = %campaign_id, "Campaign paused, waiting");
                tokio::time::sleep(PAUSE_POLL).await;
            }
            other => {
                anyhow::bail!("Campaign moved to {} mid-run", other.as_str());
            }
        }
    }
}
