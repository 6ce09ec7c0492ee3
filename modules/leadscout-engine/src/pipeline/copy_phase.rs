//! Phase 3: copy generation. A bounded worker pool writes icebreakers for
//! every business holding an email; failures are logged and skipped, and
//! the only shared state is a counter behind a mutex.

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use ai_client::Usage;
use leadscout_common::pricing::llm_cost;
use leadscout_store::Repository;

use crate::adapters::WebsiteScraper;
use crate::writer::{ProspectContext, Writer};

#[derive(Debug, Default, Clone, Copy)]
pub struct CopyPhaseOutcome {
    pub generated: u64,
    pub failed: u64,
}

pub struct CopyPhase<'a> {
    pub repo: &'a Repository,
    pub writer: &'a Writer,
    pub website: &'a WebsiteScraper,
    pub campaign_id: Uuid,
    pub template: Option<String>,
    pub workers: usize,
    pub model: String,
}

impl<'a> CopyPhase<'a> {
    pub async fn run(&self) -> Result<CopyPhaseOutcome> {
        let businesses = self.repo.get_businesses_needing_copy(self.campaign_id).await?;
        if businesses.is_empty() {
            info!(campaign_id = %self.campaign_id, "No businesses need copy");
            return Ok(CopyPhaseOutcome::default());
        }
        info!(
            businesses = businesses.len(),
            workers = self.workers,
            "Starting copy generation"
        );

        let counter = Arc::new(Mutex::new(CopyPhaseOutcome::default()));
        let usage_total = Arc::new(Mutex::new(Usage::default()));

        futures::stream::iter(businesses)
            .for_each_concurrent(self.workers, |business| {
                let counter = counter.clone();
                let usage_total = usage_total.clone();
                async move {
                    let summaries = match business.website.as_deref() {
                        Some(website) => self.website.summarize_site(website).await,
                        None => Vec::new(),
                    };

                    let prospect = ProspectContext {
                        business_id: business.id.to_string(),
                        campaign_id: self.campaign_id.to_string(),
                        business_name: business.name.clone(),
                        category: business.category.clone().unwrap_or_default(),
                        city: business.city.clone().unwrap_or_default(),
                        state: business.state.clone().unwrap_or_default(),
                        rating: business.rating,
                        reviews_count: business.reviews_count,
                        website_summaries: summaries,
                        template: self.template.clone(),
                    };

                    let (copy, usage) = self.writer.generate(&prospect).await;
                    match self.repo.save_copy(business.id, &copy).await {
                        Ok(()) => {
                            let mut c = counter.lock().await;
                            c.generated += 1;
                        }
                        Err(e) => {
                            warn!(business_id = %business.id, error = %e, "Failed to save copy");
                            let mut c = counter.lock().await;
                            c.failed += 1;
                        }
                    }

                    let mut u = usage_total.lock().await;
                    u.prompt_tokens += usage.prompt_tokens;
                    u.completion_tokens += usage.completion_tokens;
                }
            })
            .await;

        let usage = *usage_total.lock().await;
        if usage.prompt_tokens + usage.completion_tokens > 0 {
            let cost = llm_cost(&self.model, usage.prompt_tokens, usage.completion_tokens);
            if let Err(e) = self
                .repo
                .track_llm_cost(self.campaign_id, 1, cost)
                .await
            {
                warn!(error = %e, "Failed to track writer LLM cost");
            }
        }

        let outcome = *counter.lock().await;
        info!(
            generated = outcome.generated,
            failed = outcome.failed,
            "Phase 3 complete"
        );
        Ok(outcome)
    }
}
