//! Outreach copy generation: formula routing, deterministic variants, and
//! an error policy that degrades to deterministic fallback copy; the
//! pipeline never loses a campaign to a writer outage.

pub mod formulas;
pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use ai_client::{AiError, OpenAi, Usage};
use leadscout_common::GeneratedCopy;

use crate::govern::{RateGovernor, ServiceKind};
use formulas::{
    assign_variant, choose_formula, choose_subject_style, enforce_subject_cap, fallback_icebreaker,
    fallback_subject, formula_for_template, formula_weights,
};

/// A/B bucket count. Variants are deterministic in (business, campaign).
const VARIANT_BUCKETS: u32 = 2;

/// Who is sending and what they sell; drives perfect-fit detection and the
/// offering block of the prompt.
#[derive(Debug, Clone, Default)]
pub struct OrganizationProfile {
    pub product_description: String,
    pub value_proposition: String,
    pub target_categories: Vec<String>,
}

impl OrganizationProfile {
    /// Offering description from the environment; all fields optional.
    pub fn from_env() -> Self {
        let target_categories = std::env::var("TARGET_CATEGORIES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            product_description: std::env::var("PRODUCT_DESCRIPTION").unwrap_or_default(),
            value_proposition: std::env::var("VALUE_PROPOSITION").unwrap_or_default(),
            target_categories,
        }
    }

    /// Whether the prospect's category is one the product targets.
    pub fn is_perfect_fit(&self, category: &str) -> bool {
        if category.is_empty() {
            return false;
        }
        let lowered = category.to_lowercase();
        self.target_categories
            .iter()
            .any(|t| lowered.contains(&t.to_lowercase()))
    }
}

/// One prospect's context for copy generation.
#[derive(Debug, Clone)]
pub struct ProspectContext {
    pub business_id: String,
    pub campaign_id: String,
    pub business_name: String,
    pub category: String,
    pub city: String,
    pub state: String,
    pub rating: Option<f64>,
    pub reviews_count: Option<i64>,
    pub website_summaries: Vec<String>,
    /// Campaign template; `None`/"auto" routes by weighted random.
    pub template: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CopyResponse {
    #[serde(default)]
    icebreaker: String,
    #[serde(default)]
    subject_line: String,
}

pub struct Writer {
    llm: OpenAi,
    governor: Arc<RateGovernor>,
    organization: OrganizationProfile,
}

impl Writer {
    pub fn new(llm: OpenAi, governor: Arc<RateGovernor>, organization: OrganizationProfile) -> Self {
        Self {
            llm,
            governor,
            organization,
        }
    }

    /// Generate copy for one prospect. Always returns a result; model
    /// failures fall back to deterministic copy after the retry schedule
    /// runs dry. The usage is zero for fallback copy.
    pub async fn generate(&self, prospect: &ProspectContext) -> (GeneratedCopy, Usage) {
        let variant = assign_variant(&prospect.business_id, &prospect.campaign_id, VARIANT_BUCKETS);

        let explicit = prospect
            .template
            .as_deref()
            .filter(|t| *t != "auto")
            .and_then(formula_for_template);
        let is_perfect_fit = self.organization.is_perfect_fit(&prospect.category);

        let (formula, template_used) = match explicit {
            Some(formula) => (formula, prospect.template.clone().unwrap_or_default()),
            None => {
                let weights = formula_weights(
                    !prospect.website_summaries.is_empty(),
                    !prospect.city.is_empty(),
                    is_perfect_fit,
                );
                let formula = choose_formula(&weights, &mut rand::rng());
                (formula, "auto".to_string())
            }
        };
        let subject_style = choose_subject_style(&mut rand::rng());

        let user_prompt = prompts::build_user_prompt(
            &prospect.business_name,
            &prospect.category,
            &prospect.city,
            &prospect.state,
            prospect.rating,
            prospect.reviews_count,
            &prospect.website_summaries,
            &self.organization.product_description,
            &self.organization.value_proposition,
            is_perfect_fit,
            formula,
            subject_style,
        );

        match self.call_with_policy(&user_prompt, &prospect.business_name).await {
            Some((response, usage)) => {
                let subject = if response.subject_line.trim().is_empty() {
                    fallback_subject(
                        &prospect.business_name,
                        &prospect.city,
                        &prospect.category,
                        &mut rand::rng(),
                    )
                } else {
                    enforce_subject_cap(response.subject_line.trim())
                };
                info!(
                    business = %prospect.business_name,
                    formula = formula.as_str(),
                    subject_len = subject.chars().count(),
                    "Icebreaker generated"
                );
                (
                    GeneratedCopy {
                        icebreaker: response.icebreaker,
                        subject_line: subject,
                        template_used,
                        formula_used: formula.as_str().to_string(),
                        variant,
                    },
                    usage,
                )
            }
            None => {
                warn!(business = %prospect.business_name, "Falling back to deterministic copy");
                (
                    GeneratedCopy {
                        icebreaker: fallback_icebreaker(
                            &prospect.business_name,
                            &prospect.category,
                            &prospect.city,
                            prospect.rating,
                        ),
                        subject_line: fallback_subject(
                            &prospect.business_name,
                            &prospect.city,
                            &prospect.category,
                            &mut rand::rng(),
                        ),
                        template_used: "fallback".to_string(),
                        formula_used: "fallback".to_string(),
                        variant,
                    },
                    Usage::default(),
                )
            }
        }
    }

    /// Retry schedule by failure class: rate limits sleep `60 + 20·attempt`
    /// up to 3 tries, 5xx backs off `10 · 2^attempt` up to 3, network
    /// timeouts `5 · attempt` up to 2. Anything else goes straight to the
    /// fallback.
    async fn call_with_policy(
        &self,
        user_prompt: &str,
        business_name: &str,
    ) -> Option<(CopyResponse, Usage)> {
        let mut rate_limit_attempts = 0u32;
        let mut server_attempts = 0u32;
        let mut network_attempts = 0u32;

        loop {
            self.governor.wait_for_service(ServiceKind::OpenAiHeavy).await;

            match self.llm.chat_json(prompts::SYSTEM_PROMPT, user_prompt).await {
                Ok(completion) => {
                    match serde_json::from_str::<CopyResponse>(&completion.content) {
                        Ok(response) if !response.icebreaker.trim().is_empty() => {
                            return Some((response, completion.usage));
                        }
                        Ok(_) | Err(_) => {
                            debug!(business = business_name, "Unparseable copy payload");
                            return None;
                        }
                    }
                }
                Err(AiError::RateLimited(msg)) if rate_limit_attempts < 3 => {
                    rate_limit_attempts += 1;
                    let sleep = Duration::from_secs(60 + 20 * rate_limit_attempts as u64);
                    warn!(
                        business = business_name,
                        attempt = rate_limit_attempts,
                        sleep_secs = sleep.as_secs(),
                        msg,
                        "Writer rate limited"
                    );
                    tokio::time::sleep(sleep).await;
                }
                Err(AiError::Server { status, .. }) if server_attempts < 3 => {
                    server_attempts += 1;
                    let sleep = Duration::from_secs(10 * 2u64.pow(server_attempts - 1));
                    warn!(
                        business = business_name,
                        attempt = server_attempts,
                        status,
                        sleep_secs = sleep.as_secs(),
                        "Writer server error"
                    );
                    tokio::time::sleep(sleep).await;
                }
                Err(AiError::Network(msg)) if network_attempts < 2 => {
                    network_attempts += 1;
                    let sleep = Duration::from_secs(5 * network_attempts as u64);
                    warn!(
                        business = business_name,
                        attempt = network_attempts,
                        msg,
                        "Writer network error"
                    );
                    tokio::time::sleep(sleep).await;
                }
                Err(e) => {
                    warn!(business = business_name, error = %e, "Writer call failed");
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_fit_matches_category_substrings() {
        let org = OrganizationProfile {
            target_categories: vec!["dentist".to_string(), "salon".to_string()],
            ..Default::default()
        };
        assert!(org.is_perfect_fit("Cosmetic Dentist"));
        assert!(org.is_perfect_fit("salon"));
        assert!(!org.is_perfect_fit("plumber"));
        assert!(!org.is_perfect_fit(""));
    }
}
