//! External-service pricing and campaign cost estimation.
//!
//! Single source of truth for every cost calculation in the pipeline;
//! estimation for draft campaigns and actuals tracking both read from here.

use serde::{Deserialize, Serialize};

/// USD per 1000 items, by service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    MapScraping,
    Facebook,
    Linkedin,
    EmailVerification,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::MapScraping => "google_maps",
            Service::Facebook => "facebook",
            Service::Linkedin => "linkedin",
            Service::EmailVerification => "email_verification",
        }
    }

    pub fn cost_per_thousand(&self) -> f64 {
        match self {
            Service::MapScraping => 4.00,
            Service::Facebook => 10.00,
            Service::Linkedin => 10.00,
            Service::EmailVerification => 2.00,
        }
    }

    /// Cost in USD for processing `items` units.
    pub fn cost(&self, items: u64) -> f64 {
        (items as f64 / 1000.0) * self.cost_per_thousand()
    }
}

/// USD per 1k tokens for the models the pipeline calls.
/// Unknown models fall back to the heavy-model rate.
pub fn llm_cost(model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    let (input_rate, output_rate) = match model {
        m if m.contains("mini") => (0.000_15, 0.000_6),
        m if m.contains("gpt-4o") => (0.002_5, 0.01),
        _ => (0.002_5, 0.01),
    };
    (prompt_tokens as f64 / 1000.0) * input_rate
        + (completion_tokens as f64 / 1000.0) * output_rate
}

/// Coverage-share assumptions used when actual counts aren't known yet.
pub const FACEBOOK_COVERAGE: f64 = 0.30;
pub const LINKEDIN_COVERAGE: f64 = 0.50;
pub const EMAIL_SUCCESS_RATE: f64 = 0.15;

/// Estimated campaign spend, by service.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CostEstimate {
    pub map_cost: f64,
    pub facebook_cost: f64,
    pub linkedin_cost: f64,
    pub verifier_cost: f64,
    pub total: f64,
}

/// Estimate total campaign cost from an expected business count:
/// map scraping for every business, Facebook enrichment for the share of
/// businesses with pages, LinkedIn lookup for the share needing it, and
/// verification for every email expected to be discovered.
pub fn estimate_campaign_cost(expected_businesses: u64) -> CostEstimate {
    let map_cost = Service::MapScraping.cost(expected_businesses);
    let facebook_pages = (expected_businesses as f64 * FACEBOOK_COVERAGE).round() as u64;
    let facebook_cost = Service::Facebook.cost(facebook_pages);
    let linkedin_lookups = (expected_businesses as f64 * LINKEDIN_COVERAGE).round() as u64;
    let linkedin_cost = Service::Linkedin.cost(linkedin_lookups);
    let emails = (expected_businesses as f64 * EMAIL_SUCCESS_RATE).round() as u64;
    let verifier_cost = Service::EmailVerification.cost(emails);

    CostEstimate {
        map_cost,
        facebook_cost,
        linkedin_cost,
        verifier_cost,
        total: map_cost + facebook_cost + linkedin_cost + verifier_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_cost_scales_per_thousand() {
        assert!((Service::MapScraping.cost(1000) - 4.0).abs() < 1e-9);
        assert!((Service::EmailVerification.cost(500) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_combines_all_services() {
        let est = estimate_campaign_cost(1000);
        // 1000 businesses: 4.00 map + 300 fb pages (3.00) + 500 li (5.00)
        // + 150 verifications (0.30)
        assert!((est.map_cost - 4.0).abs() < 1e-9);
        assert!((est.facebook_cost - 3.0).abs() < 1e-9);
        assert!((est.linkedin_cost - 5.0).abs() < 1e-9);
        assert!((est.verifier_cost - 0.3).abs() < 1e-9);
        assert!((est.total - 12.3).abs() < 1e-9);
    }

    #[test]
    fn mini_models_are_cheaper() {
        let mini = llm_cost("gpt-4o-mini", 1000, 1000);
        let full = llm_cost("gpt-4o", 1000, 1000);
        assert!(mini < full);
    }
}
