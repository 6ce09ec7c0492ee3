//! The campaign executor: coverage analysis into a draft campaign, then the
//! four-phase run with heartbeat, per-phase timeouts, and partial-failure
//! tolerance. Only Phase 1 (or a repository fatal) can fail a campaign for
//! non-timeout reasons; enrichment and writer failures are contained.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use ai_client::OpenAi;
use apify_client::ApifyClient;
use leadscout_common::pricing::llm_cost;
use leadscout_common::{CampaignStatus, Config, CoverageProfile};
use leadscout_store::{CampaignRow, NewCampaign, NewCoverageCell, Repository};

use crate::adapters::{
    EmailVerifier, MapScraper, ProfessionalScraper, SocialScraper, WebsiteScraper,
};
use crate::coverage::{CoverageAnalyzer, ZipCatalog};
use crate::govern::RateGovernor;
use crate::writer::{OrganizationProfile, Writer};

use super::copy_phase::CopyPhase;
use super::heartbeat::spawn_heartbeat;
use super::map_phase::MapPhase;
use super::professional_phase::ProfessionalPhase;
use super::social_phase::SocialPhase;

const PHASE_1_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const PHASE_2_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const PHASE_2_5_TIMEOUT: Duration = Duration::from_secs(90 * 60);

/// Per-cell default when the caller doesn't cap results.
const DEFAULT_MAX_PER_ZIP: u32 = 1000;

/// What a finished (or failed) execution looked like.
#[derive(Debug, Clone)]
pub struct CampaignSummary {
    pub campaign_id: Uuid,
    pub status: CampaignStatus,
    pub businesses_found: i64,
    pub emails_found: i64,
    pub icebreakers_generated: u64,
    pub total_cost: f64,
    pub error_message: Option<String>,
}

pub struct PipelineExecutor {
    repo: Repository,
    config: Config,
    governor: Arc<RateGovernor>,
    analyzer: CoverageAnalyzer,
    map: MapScraper,
    social: SocialScraper,
    professional: ProfessionalScraper,
    verifier: EmailVerifier,
    writer: Writer,
    website: WebsiteScraper,
    apify: Arc<ApifyClient>,
    llm_light: OpenAi,
}

impl PipelineExecutor {
    pub fn new(config: Config, repo: Repository, organization: OrganizationProfile) -> Self {
        let governor = Arc::new(RateGovernor::new(
            Duration::from_secs(config.domain_request_delay_s),
            config.website_failure_threshold,
        ));
        let apify = Arc::new(ApifyClient::new(config.apify_api_key.clone()));
        let catalog = Arc::new(ZipCatalog::load());
        let llm_light = OpenAi::new(&config.openai_api_key, &config.openai_model_light);
        let llm_heavy = OpenAi::new(&config.openai_api_key, &config.openai_model_heavy);

        Self {
            analyzer: CoverageAnalyzer::new(llm_light.clone(), catalog, governor.clone()),
            map: MapScraper::new(apify.clone(), governor.clone()),
            social: SocialScraper::new(apify.clone(), governor.clone()),
            professional: ProfessionalScraper::new(apify.clone(), governor.clone()),
            verifier: EmailVerifier::new(config.verifier_api_key.clone(), governor.clone()),
            writer: Writer::new(llm_heavy, governor.clone(), organization),
            website: WebsiteScraper::new(
                llm_light.clone(),
                governor.clone(),
                Duration::from_secs(config.website_timeout_s),
            ),
            apify,
            llm_light,
            governor,
            config,
            repo,
        }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Run coverage analysis and persist a draft campaign with its chosen
    /// ZIPs and cost estimate. A manual-mode analysis still creates the
    /// campaign, with zero cells; `execute` will refuse it.
    pub async fn create(
        &self,
        name: &str,
        location: &str,
        keywords: Vec<String>,
        profile: CoverageProfile,
        template: Option<String>,
        organization_id: Option<Uuid>,
    ) -> Result<CampaignRow> {
        anyhow::ensure!(!keywords.is_empty(), "At least one keyword is required");

        let analysis = self.analyzer.analyze(location, &keywords, profile).await;
        if analysis.manual_mode {
            warn!(location, "Coverage analysis failed; campaign will need manual coverage");
        }

        let campaign = self
            .repo
            .create_campaign(&NewCampaign {
                name: name.to_string(),
                location: location.to_string(),
                keywords: keywords.clone(),
                profile,
                template,
                organization_id,
                coverage_target: profile.params().coverage_target,
                estimated_cost: analysis.cost.total,
            })
            .await?;

        let cells: Vec<NewCoverageCell> = analysis
            .selected
            .iter()
            .map(|z| NewCoverageCell {
                zip_code: z.zip.clone(),
                keywords: keywords.clone(),
                max_results: DEFAULT_MAX_PER_ZIP as i32,
                estimated_businesses: Some(z.estimated_businesses),
            })
            .collect();
        if !cells.is_empty() {
            self.repo.add_coverage_cells(campaign.id, &cells).await?;
        }

        let analysis_tokens = analysis.prompt_tokens + analysis.completion_tokens;
        if analysis_tokens > 0 {
            let cost = llm_cost(
                &self.config.openai_model_light,
                analysis.prompt_tokens,
                analysis.completion_tokens,
            );
            self.repo.track_llm_cost(campaign.id, 1, cost).await?;
        }

        info!(
            campaign_id = %campaign.id,
            zips = cells.len(),
            estimated_cost = analysis.cost.total,
            "Campaign created in draft"
        );
        Ok(campaign)
    }

    /// Run the four phases. Idempotent with respect to completed work: the
    /// repository's upserts and attempt rows make reruns no-ops.
    pub async fn execute(&self, campaign_id: Uuid, max_per_zip: Option<u32>) -> Result<CampaignSummary> {
        let campaign = self.repo.get_campaign(campaign_id).await?;
        anyhow::ensure!(
            campaign.status() != CampaignStatus::Running,
            "Campaign {campaign_id} is already running"
        );

        let coverage = self.repo.get_coverage(campaign_id, None).await?;
        if coverage.is_empty() {
            let message = "No coverage cells; coverage analysis was manual-mode";
            self.repo
                .finalize_campaign(campaign_id, CampaignStatus::Failed, Some(message))
                .await?;
            return self.summarize(campaign_id, 0).await;
        }

        self.repo.mark_campaign_started(campaign_id).await?;
        info!(campaign_id = %campaign_id, name = %campaign.name, "Campaign execution started");

        // Dropped on every exit path below, stopping the background task.
        let _heartbeat = spawn_heartbeat(
            self.repo.clone(),
            campaign_id,
            Duration::from_secs(self.config.heartbeat_interval_s),
        );

        // --- Phase 1: map discovery ---
        let map_phase = MapPhase {
            repo: &self.repo,
            scraper: &self.map,
            verifier: &self.verifier,
            campaign_id,
            organization_id: campaign.organization_id,
            max_per_zip: max_per_zip.unwrap_or(DEFAULT_MAX_PER_ZIP),
        };
        let outcome = match timeout(PHASE_1_TIMEOUT, map_phase.run()).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(campaign_id = %campaign_id, error = %e, "Phase 1 failed");
                return self.fail(campaign_id, &format!("Phase 1 failed: {e}")).await;
            }
            Err(_) => {
                return self
                    .fail(campaign_id, "Phase 1 timed out after 30 minutes")
                    .await;
            }
        };

        // Totals are durable before the fragile enrichment phases run.
        self.repo
            .update_campaign_totals(
                campaign_id,
                outcome.businesses,
                outcome.direct_emails,
                outcome.facebook_pages,
            )
            .await?;

        // --- Phase 2: social enrichment (contained) ---
        let social_phase = SocialPhase {
            repo: &self.repo,
            scraper: &self.social,
            verifier: &self.verifier,
            campaign_id,
        };
        match timeout(PHASE_2_TIMEOUT, social_phase.run()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(campaign_id = %campaign_id, error = %e, "Phase 2 failed, skipping"),
            Err(_) => {
                return self
                    .fail(campaign_id, "Phase 2 timed out after 60 minutes")
                    .await;
            }
        }
        self.refresh_email_total(campaign_id).await;

        // --- Phase 2.5: professional enrichment (contained) ---
        let professional_phase = ProfessionalPhase {
            repo: &self.repo,
            scraper: &self.professional,
            verifier: &self.verifier,
            campaign_id,
            batch_size: self.config.professional_batch_size,
            max_parallel: self.config.max_parallel_professional_batches,
        };
        match timeout(PHASE_2_5_TIMEOUT, professional_phase.run()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(campaign_id = %campaign_id, error = %e, "Phase 2.5 failed, skipping")
            }
            Err(_) => {
                return self
                    .fail(campaign_id, "Phase 2.5 timed out after 90 minutes")
                    .await;
            }
        }
        self.refresh_email_total(campaign_id).await;

        // --- Phase 3: copy generation (workers self-limit, no outer wrap) ---
        let copy_phase = CopyPhase {
            repo: &self.repo,
            writer: &self.writer,
            website: &self.website,
            campaign_id,
            template: campaign.template.clone(),
            workers: self.config.max_parallel_icebreaker_workers,
            model: self.config.openai_model_heavy.clone(),
        };
        let icebreakers = match copy_phase.run().await {
            Ok(outcome) => outcome.generated,
            Err(e) => {
                warn!(campaign_id = %campaign_id, error = %e, "Phase 3 failed, skipping");
                0
            }
        };

        // --- Finalization ---
        let businesses = self.repo.count_businesses(campaign_id).await?;
        let emails = self.repo.count_businesses_with_email(campaign_id).await?;
        let facebook_pages = self.repo.count_facebook_pages(campaign_id).await?;
        self.repo
            .update_campaign_totals(campaign_id, businesses, emails, facebook_pages)
            .await?;
        self.repo
            .finalize_campaign(campaign_id, CampaignStatus::Completed, None)
            .await?;

        if let Err(e) = self.repo.refresh_master_leads().await {
            warn!(error = %e, "master_leads refresh failed");
        }

        info!(campaign_id = %campaign_id, businesses, emails, icebreakers, "Campaign completed");
        self.summarize(campaign_id, icebreakers).await
    }

    /// Flip a running campaign to paused; the executor suspends at the next
    /// batch boundary.
    pub async fn pause(&self, campaign_id: Uuid) -> Result<()> {
        let campaign = self.repo.get_campaign(campaign_id).await?;
        anyhow::ensure!(
            campaign.status() == CampaignStatus::Running,
            "Only running campaigns can pause"
        );
        self.repo
            .set_campaign_status(campaign_id, CampaignStatus::Paused, None)
            .await?;
        Ok(())
    }

    pub async fn resume(&self, campaign_id: Uuid) -> Result<()> {
        let campaign = self.repo.get_campaign(campaign_id).await?;
        anyhow::ensure!(
            campaign.status() == CampaignStatus::Paused,
            "Only paused campaigns can resume"
        );
        self.repo
            .set_campaign_status(campaign_id, CampaignStatus::Running, None)
            .await?;
        Ok(())
    }

    /// Probe each configured dependency. Used by `run --test` before
    /// scheduling anything.
    pub async fn test_connections(&self) -> bool {
        let mut ok = true;

        match self.repo.next_draft_campaign().await {
            Ok(_) => info!("Database connection OK"),
            Err(e) => {
                error!(error = %e, "Database connection failed");
                ok = false;
            }
        }

        if self.config.verifier_api_key.is_empty() {
            warn!("VERIFIER_API_KEY not set, skipping verifier check");
        } else if self.verifier.test_connection().await {
            info!("Email verifier OK");
        } else {
            error!("Email verifier check failed");
            ok = false;
        }

        if self.config.apify_api_key.is_empty() {
            warn!("APIFY_API_KEY not set, skipping actor platform check");
        } else if self.apify.test_connection().await {
            info!("Actor platform OK");
        } else {
            error!("Actor platform check failed");
            ok = false;
        }

        if self.config.openai_api_key.is_empty() {
            warn!("OPENAI_API_KEY not set, skipping LLM check");
        } else {
            match self
                .llm_light
                .chat_json("Reply with JSON.", "Return {\"ok\": true}")
                .await
            {
                Ok(_) => info!("LLM OK"),
                Err(e) => {
                    error!(error = %e, "LLM check failed");
                    ok = false;
                }
            }
        }

        ok
    }

    async fn refresh_email_total(&self, campaign_id: Uuid) {
        match self.repo.count_businesses_with_email(campaign_id).await {
            Ok(emails) => {
                if let Err(e) = self.repo.set_total_emails(campaign_id, emails).await {
                    warn!(error = %e, "Failed to persist email total");
                }
            }
            Err(e) => warn!(error = %e, "Failed to recount emails"),
        }
    }

    async fn fail(&self, campaign_id: Uuid, message: &str) -> Result<CampaignSummary> {
        error!(campaign_id = %campaign_id, message, "Campaign failed");
        self.repo
            .finalize_campaign(campaign_id, CampaignStatus::Failed, Some(message))
            .await?;
        self.summarize(campaign_id, 0).await
    }

    async fn summarize(&self, campaign_id: Uuid, icebreakers: u64) -> Result<CampaignSummary> {
        let row = self.repo.get_campaign(campaign_id).await?;
        Ok(CampaignSummary {
            campaign_id,
            status: row.status(),
            businesses_found: row.total_businesses_found,
            emails_found: row.total_emails_found,
            icebreakers_generated: icebreakers,
            total_cost: row.actual_cost(),
            error_message: row.error_message,
        })
    }
}
