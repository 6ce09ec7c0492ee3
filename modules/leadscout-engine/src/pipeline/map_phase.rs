//! Phase 1: map discovery. ZIPs run in batches of ten per actor run, one
//! run per keyword; returned businesses are attributed to the ZIP in their
//! own address and upserted on `(campaign_id, place_id)`.

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use leadscout_common::pricing::Service;
use leadscout_common::EmailSource;
use leadscout_store::Repository;

use crate::adapters::map::{build_queries, partition_by_zip};
use crate::adapters::{EmailVerifier, MapScraper};

use super::check_control;

/// ZIPs per actor run.
const ZIP_BATCH: usize = 10;

#[derive(Debug, Default, Clone, Copy)]
pub struct MapPhaseOutcome {
    pub businesses: i64,
    pub direct_emails: i64,
    pub facebook_pages: i64,
    pub cost: f64,
}

pub struct MapPhase<'a> {
    pub repo: &'a Repository,
    pub scraper: &'a MapScraper,
    pub verifier: &'a EmailVerifier,
    pub campaign_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub max_per_zip: u32,
}

impl<'a> MapPhase<'a> {
    pub async fn run(&self) -> Result<MapPhaseOutcome> {
        let coverage = self.repo.get_coverage(self.campaign_id, Some(false)).await?;
        if coverage.is_empty() {
            info!(campaign_id = %self.campaign_id, "No unscraped coverage cells, Phase 1 is a no-op");
        }

        let mut outcome = MapPhaseOutcome::default();

        for chunk in coverage.chunks(ZIP_BATCH) {
            check_control(self.repo, self.campaign_id).await?;

            let zips: Vec<String> = chunk.iter().map(|c| c.zip_code.clone()).collect();
            let keywords: Vec<String> = chunk
                .first()
                .map(|c| c.keywords.clone())
                .unwrap_or_default();
            info!(zips = ?zips, "Scraping ZIP batch");

            let mut batch_items = 0usize;
            for keyword in &keywords {
                let queries = build_queries(keyword, &zips);
                let raw_items = match self.scraper.scrape(&queries, self.max_per_zip).await {
                    Ok(items) => items,
                    Err(e) => {
                        warn!(keyword, error = %e, "Map scrape failed for keyword, continuing");
                        continue;
                    }
                };
                batch_items += raw_items.len();

                // Businesses land under the ZIP in their own address, which
                // may include neighbours the actor spilled into.
                for (zip, items) in partition_by_zip(raw_items) {
                    self.repo
                        .upsert_businesses(
                            self.campaign_id,
                            self.organization_id,
                            &zip,
                            &items,
                        )
                        .await?;
                }
            }

            let batch_cost = Service::MapScraping.cost(batch_items as u64);
            outcome.cost += batch_cost;
            if batch_items > 0 {
                self.repo
                    .track_api_cost(
                        self.campaign_id,
                        Service::MapScraping,
                        batch_items as i32,
                        batch_cost,
                    )
                    .await?;
            }

            // Verify the direct emails this batch surfaced, sequentially.
            self.verify_direct_emails().await?;

            // Durable per-cell counts, re-queried rather than trusted from
            // the upsert return values.
            for cell in chunk {
                let businesses = self.repo.count_by_zip(self.campaign_id, &cell.zip_code).await?;
                let emails = self
                    .repo
                    .count_direct_emails_by_zip(self.campaign_id, &cell.zip_code)
                    .await?;
                self.repo
                    .update_coverage_status(
                        self.campaign_id,
                        &cell.zip_code,
                        businesses as i32,
                        emails as i32,
                        Service::MapScraping.cost(businesses.max(0) as u64),
                    )
                    .await?;
            }
        }

        outcome.businesses = self.repo.count_businesses(self.campaign_id).await?;
        outcome.direct_emails = self.repo.count_businesses_with_email(self.campaign_id).await?;
        outcome.facebook_pages = self.repo.count_facebook_pages(self.campaign_id).await?;

        info!(
            businesses = outcome.businesses,
            direct_emails = outcome.direct_emails,
            facebook_pages = outcome.facebook_pages,
            cost = outcome.cost,
            "Phase 1 complete"
        );
        Ok(outcome)
    }

    async fn verify_direct_emails(&self) -> Result<()> {
        let pending = self.repo.get_unverified_direct_emails(self.campaign_id).await?;
        if pending.is_empty() {
            return Ok(());
        }

        let emails: Vec<String> = pending.iter().map(|(_, e)| e.clone()).collect();
        let records = self.verifier.verify_batch(&emails).await;

        for ((business_id, _), record) in pending.iter().zip(records.iter()) {
            self.repo
                .update_business_verification(*business_id, record)
                .await?;
            self.repo
                .record_verification(
                    self.campaign_id,
                    Some(*business_id),
                    None,
                    EmailSource::GoogleMaps,
                    record,
                )
                .await?;
        }

        let cost = Service::EmailVerification.cost(records.len() as u64);
        self.repo
            .track_api_cost(
                self.campaign_id,
                Service::EmailVerification,
                records.len() as i32,
                cost,
            )
            .await?;
        Ok(())
    }
}
