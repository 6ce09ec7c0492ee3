//! Phase 2: social enrichment. Facebook URLs are normalized and
//! deduplicated before the scraper call; a page shared by several
//! businesses (chains) fans its result out to every one of them as
//! independent enrichment rows.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use leadscout_common::pricing::Service;
use leadscout_common::{EmailSource, SocialEnrichment, VerificationRecord};
use leadscout_store::{BusinessRow, Repository};

use crate::adapters::social::{extract_contact, normalize_facebook_url};
use crate::adapters::{EmailVerifier, SocialScraper};

use super::check_control;

/// Cap on businesses pulled into one social-enrichment pass.
const SOCIAL_ENRICHMENT_LIMIT: i64 = 500;

/// Page URLs per scraper sub-batch.
const URL_BATCH: usize = 50;

#[derive(Debug, Default, Clone, Copy)]
pub struct SocialPhaseOutcome {
    pub pages_scraped: u64,
    pub enrichment_rows: u64,
    pub emails_found: u64,
}

pub struct SocialPhase<'a> {
    pub repo: &'a Repository,
    pub scraper: &'a SocialScraper,
    pub verifier: &'a EmailVerifier,
    pub campaign_id: Uuid,
}

impl<'a> SocialPhase<'a> {
    pub async fn run(&self) -> Result<SocialPhaseOutcome> {
        let businesses = self
            .repo
            .get_businesses_for_social_enrichment(self.campaign_id, SOCIAL_ENRICHMENT_LIMIT)
            .await?;
        if businesses.is_empty() {
            info!(campaign_id = %self.campaign_id, "No businesses need social enrichment");
            return Ok(SocialPhaseOutcome::default());
        }

        // Normalized URL → businesses sharing that page.
        let mut by_url: HashMap<String, Vec<&BusinessRow>> = HashMap::new();
        for business in &businesses {
            let Some(ref url) = business.facebook_url else {
                continue;
            };
            by_url
                .entry(normalize_facebook_url(url))
                .or_default()
                .push(business);
        }
        let urls: Vec<String> = by_url.keys().cloned().collect();
        info!(
            businesses = businesses.len(),
            unique_pages = urls.len(),
            "Starting social enrichment"
        );

        let mut outcome = SocialPhaseOutcome::default();
        let mut verification_cache: HashMap<String, VerificationRecord> = HashMap::new();

        for batch in urls.chunks(URL_BATCH) {
            check_control(self.repo, self.campaign_id).await?;

            let pages = match self.scraper.scrape_pages(batch).await {
                Ok(pages) => pages,
                Err(e) => {
                    warn!(error = %e, "Facebook batch failed, recording attempts and continuing");
                    Vec::new()
                }
            };
            outcome.pages_scraped += pages.len() as u64;

            // Match pages back by normalized URL; fan each out to every
            // business sharing the page.
            let mut matched: std::collections::HashSet<String> = std::collections::HashSet::new();
            for (page, raw) in pages {
                let Some(url) = page.any_url().map(normalize_facebook_url) else {
                    continue;
                };
                let Some(sharers) = by_url.get(url.as_str()) else {
                    continue;
                };
                matched.insert(url.clone());

                let enrichment = extract_contact(&page, raw);
                if enrichment.primary_email.is_some() {
                    outcome.emails_found += sharers.len() as u64;
                }
                for business in sharers {
                    self.apply_enrichment(business.id, &enrichment, &mut verification_cache)
                        .await?;
                    outcome.enrichment_rows += 1;
                }
            }

            // Pages that returned nothing still produce attempt rows, so
            // reruns skip them.
            for url in batch {
                if matched.contains(url) {
                    continue;
                }
                let Some(sharers) = by_url.get(url) else {
                    continue;
                };
                let attempt = SocialEnrichment {
                    facebook_url: Some(url.clone()),
                    ..Default::default()
                };
                for business in sharers {
                    self.repo
                        .save_social_enrichment(business.id, self.campaign_id, &attempt)
                        .await?;
                    outcome.enrichment_rows += 1;
                }
            }

            if !batch.is_empty() {
                let cost = Service::Facebook.cost(batch.len() as u64);
                self.repo
                    .track_api_cost(self.campaign_id, Service::Facebook, batch.len() as i32, cost)
                    .await?;
            }
        }

        info!(
            pages = outcome.pages_scraped,
            rows = outcome.enrichment_rows,
            emails = outcome.emails_found,
            "Phase 2 complete"
        );
        Ok(outcome)
    }

    /// Save the enrichment row for one business and verify its primary
    /// email (verifier results are cached per address; chains share one
    /// verdict).
    async fn apply_enrichment(
        &self,
        business_id: Uuid,
        enrichment: &SocialEnrichment,
        cache: &mut HashMap<String, VerificationRecord>,
    ) -> Result<()> {
        let enrichment_id = self
            .repo
            .save_social_enrichment(business_id, self.campaign_id, enrichment)
            .await?;

        let Some(ref email) = enrichment.primary_email else {
            return Ok(());
        };

        let record = match cache.get(email) {
            Some(record) => record.clone(),
            None => {
                let record = match self.verifier.verify(email).await {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(email, error = %e, "Verification failed, skipping verdict");
                        return Ok(());
                    }
                };
                self.repo
                    .track_api_cost(
                        self.campaign_id,
                        Service::EmailVerification,
                        1,
                        Service::EmailVerification.cost(1),
                    )
                    .await?;
                cache.insert(email.clone(), record.clone());
                record
            }
        };

        self.repo
            .update_social_verification(enrichment_id, &record)
            .await?;
        self.repo
            .record_verification(
                self.campaign_id,
                Some(business_id),
                Some(enrichment_id),
                EmailSource::Facebook,
                &record,
            )
            .await?;
        Ok(())
    }
}
