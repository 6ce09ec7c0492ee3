//! Phase 2.5: professional enrichment. Businesses run through parallel
//! batches: one batch Google search to find profile URLs, grouped profile
//! scrapes (companies and personal profiles each in a single call), then
//! verified-email extraction or pattern generation, and deliverability
//! checks. Every attempt writes an enrichment row, found or not.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use leadscout_common::pricing::Service;
use leadscout_common::{EmailQualityTier, EmailSource, ProfessionalEnrichment};
use leadscout_store::extract::contact_name_from_profile_url;
use leadscout_store::{BusinessRow, Repository};

use crate::adapters::professional::{
    build_search_query, generate_pattern_emails, normalize_profile_url, profile_kind, ProfileKind,
};
use crate::adapters::{EmailVerifier, ProfessionalScraper};

use super::check_control;

#[derive(Debug, Default, Clone, Copy)]
pub struct ProfessionalPhaseOutcome {
    pub processed: u64,
    pub profiles_found: u64,
    pub verified_emails: u64,
    pub pattern_emails: u64,
}

impl ProfessionalPhaseOutcome {
    fn merge(&mut self, other: ProfessionalPhaseOutcome) {
        self.processed += other.processed;
        self.profiles_found += other.profiles_found;
        self.verified_emails += other.verified_emails;
        self.pattern_emails += other.pattern_emails;
    }
}

pub struct ProfessionalPhase<'a> {
    pub repo: &'a Repository,
    pub scraper: &'a ProfessionalScraper,
    pub verifier: &'a EmailVerifier,
    pub campaign_id: Uuid,
    pub batch_size: usize,
    pub max_parallel: usize,
}

impl<'a> ProfessionalPhase<'a> {
    pub async fn run(&self) -> Result<ProfessionalPhaseOutcome> {
        let businesses = self
            .repo
            .get_businesses_for_professional_enrichment(self.campaign_id)
            .await?;
        if businesses.is_empty() {
            info!(campaign_id = %self.campaign_id, "No businesses need professional enrichment");
            return Ok(ProfessionalPhaseOutcome::default());
        }

        let batches: Vec<Vec<BusinessRow>> = businesses
            .chunks(self.batch_size)
            .map(|c| c.to_vec())
            .collect();
        info!(
            businesses = businesses.len(),
            batches = batches.len(),
            max_parallel = self.max_parallel,
            "Starting professional enrichment"
        );

        let outcome = Arc::new(Mutex::new(ProfessionalPhaseOutcome::default()));

        futures::stream::iter(batches.into_iter().enumerate())
            .for_each_concurrent(self.max_parallel, |(batch_num, batch)| {
                let outcome = outcome.clone();
                async move {
                    if let Err(e) = check_control(self.repo, self.campaign_id).await {
                        warn!(batch_num, error = %e, "Skipping batch, campaign no longer running");
                        return;
                    }
                    match self.process_batch(batch_num, &batch).await {
                        Ok(stats) => outcome.lock().await.merge(stats),
                        Err(e) => {
                            warn!(batch_num, error = %e, "Professional batch failed, continuing")
                        }
                    }
                }
            })
            .await;

        let outcome = *outcome.lock().await;
        info!(
            processed = outcome.processed,
            profiles = outcome.profiles_found,
            verified = outcome.verified_emails,
            pattern = outcome.pattern_emails,
            "Phase 2.5 complete"
        );
        Ok(outcome)
    }

    async fn process_batch(
        &self,
        batch_num: usize,
        batch: &[BusinessRow],
    ) -> Result<ProfessionalPhaseOutcome> {
        let mut outcome = ProfessionalPhaseOutcome::default();

        // One batch search finds every business's profile URL at once.
        let queries: Vec<(String, &BusinessRow)> = batch
            .iter()
            .map(|b| (build_search_query(&b.name, b.city.as_deref()), b))
            .collect();
        let query_strings: Vec<String> = queries.iter().map(|(q, _)| q.clone()).collect();

        let found_urls = self.scraper.find_profile_urls(&query_strings).await?;
        self.repo
            .track_api_cost(
                self.campaign_id,
                Service::Linkedin,
                query_strings.len() as i32,
                Service::Linkedin.cost(query_strings.len() as u64),
            )
            .await?;

        // Group the hits by profile kind for the two grouped scrape calls.
        let mut company_urls: Vec<String> = Vec::new();
        let mut personal_urls: Vec<String> = Vec::new();
        let mut url_for_business: HashMap<Uuid, String> = HashMap::new();
        for (query, business) in &queries {
            let Some(url) = found_urls.get(query) else {
                continue;
            };
            url_for_business.insert(business.id, url.clone());
            match profile_kind(url) {
                Some(ProfileKind::Company) => company_urls.push(url.clone()),
                Some(ProfileKind::Personal) => personal_urls.push(url.clone()),
                None => {}
            }
        }

        let companies = self
            .scraper
            .scrape_profiles(ProfileKind::Company, &company_urls)
            .await
            .unwrap_or_else(|e| {
                warn!(batch_num, error = %e, "Company scrape failed");
                HashMap::new()
            });
        let profiles = self
            .scraper
            .scrape_profiles(ProfileKind::Personal, &personal_urls)
            .await
            .unwrap_or_else(|e| {
                warn!(batch_num, error = %e, "Profile scrape failed");
                HashMap::new()
            });
        let scraped_count = company_urls.len() + personal_urls.len();
        if scraped_count > 0 {
            self.repo
                .track_api_cost(
                    self.campaign_id,
                    Service::Linkedin,
                    scraped_count as i32,
                    Service::Linkedin.cost(scraped_count as u64),
                )
                .await?;
        }

        // Tier-2 source: public emails straight off the personal profiles.
        let extracted = self
            .scraper
            .extract_verified_emails(&personal_urls)
            .await
            .unwrap_or_else(|e| {
                warn!(batch_num, error = %e, "Email extraction failed");
                HashMap::new()
            });

        for (_, business) in &queries {
            let enrichment = match url_for_business.get(&business.id) {
                Some(url) => {
                    let normalized = normalize_profile_url(url);
                    let kind = profile_kind(url);
                    let item = match kind {
                        Some(ProfileKind::Company) => companies.get(&normalized),
                        Some(ProfileKind::Personal) => profiles.get(&normalized),
                        None => None,
                    };

                    let person_name = match kind {
                        Some(ProfileKind::Personal) => item
                            .and_then(|i| match (&i.first_name, &i.last_name) {
                                (Some(f), Some(l)) => Some(format!("{f} {l}")),
                                _ => i.name.clone(),
                            })
                            .or_else(|| {
                                contact_name_from_profile_url(url).map(|(first, last)| {
                                    match last {
                                        Some(last) => format!("{first} {last}"),
                                        None => first,
                                    }
                                })
                            }),
                        _ => item.and_then(|i| i.name.clone()).or_else(|| Some(business.name.clone())),
                    };

                    let mut emails_found: Vec<String> =
                        item.map(|i| i.emails()).unwrap_or_default();
                    if let Some(extracted_item) = extracted.get(&normalized) {
                        if let Some(ref email) = extracted_item.email {
                            if !email.is_empty() && !emails_found.contains(email) {
                                // Extractor hits are the highest-quality source.
                                emails_found.insert(0, email.clone());
                            }
                        }
                    }

                    let emails_generated = if emails_found.is_empty() {
                        match (&person_name, &business.website) {
                            (Some(name), Some(website)) => generate_pattern_emails(name, website),
                            _ => Vec::new(),
                        }
                    } else {
                        Vec::new()
                    };

                    let tier = if !emails_found.is_empty() {
                        EmailQualityTier::Verified
                    } else if !emails_generated.is_empty() {
                        EmailQualityTier::PatternGenerated
                    } else {
                        EmailQualityTier::NotFound
                    };
                    let primary_email = emails_found
                        .first()
                        .or_else(|| emails_generated.first())
                        .cloned();

                    match tier {
                        EmailQualityTier::Verified => outcome.verified_emails += 1,
                        EmailQualityTier::PatternGenerated => outcome.pattern_emails += 1,
                        EmailQualityTier::NotFound => {}
                    }
                    outcome.profiles_found += 1;

                    ProfessionalEnrichment {
                        linkedin_url: Some(normalized.clone()),
                        profile_type: kind.map(|k| k.as_str().to_string()),
                        profile_found: item.is_some(),
                        person_name,
                        person_title: item.and_then(|i| {
                            i.headline.clone().or_else(|| i.industry.clone())
                        }),
                        emails_found,
                        emails_generated,
                        primary_email,
                        email_quality_tier: tier,
                        phone: item
                            .and_then(|i| i.phone.clone())
                            .or_else(|| {
                                extracted
                                    .get(&normalized)
                                    .and_then(|e| e.any_phone().map(|p| p.to_string()))
                            }),
                        raw: item
                            .map(|i| serde_json::to_value(i.clone()).unwrap_or_default())
                            .unwrap_or_default(),
                    }
                }
                // No profile hit: still record the attempt.
                None => ProfessionalEnrichment::default(),
            };

            let enrichment_id = self
                .repo
                .save_professional_enrichment(business.id, self.campaign_id, &enrichment)
                .await?;
            outcome.processed += 1;

            if let Some(ref email) = enrichment.primary_email {
                match self.verifier.verify(email).await {
                    Ok(record) => {
                        self.repo
                            .update_professional_verification(enrichment_id, &record)
                            .await?;
                        self.repo
                            .record_verification(
                                self.campaign_id,
                                Some(business.id),
                                Some(enrichment_id),
                                EmailSource::Linkedin,
                                &record,
                            )
                            .await?;
                        self.repo
                            .track_api_cost(
                                self.campaign_id,
                                Service::EmailVerification,
                                1,
                                Service::EmailVerification.cost(1),
                            )
                            .await?;
                    }
                    Err(e) => warn!(email, error = %e, "Verification failed, skipping verdict"),
                }
            }
        }

        Ok(outcome)
    }
}
