//! Professional (LinkedIn) enrichment adapter: batched profile discovery via
//! Google search, grouped profile scrapes, verified-email extraction, and
//! pattern-email generation.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use apify_client::{ApifyClient, GoogleSearchPage, LinkedInItem, ProfileEmailItem};

use crate::govern::{RateGovernor, ServiceKind};

/// Domains that can never host a business mailbox.
const NON_BUSINESS_DOMAINS: [&str; 6] = [
    "facebook.com",
    "linkedin.com",
    "instagram.com",
    "twitter.com",
    "yelp.com",
    "youtube.com",
];

/// Personal vs company profile, from the URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Personal,
    Company,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Personal => "personal",
            ProfileKind::Company => "company",
        }
    }
}

pub fn profile_kind(url: &str) -> Option<ProfileKind> {
    if url.contains("/company/") {
        Some(ProfileKind::Company)
    } else if url.contains("/in/") {
        Some(ProfileKind::Personal)
    } else {
        None
    }
}

/// Canonical form of a profile URL: scheme forced, query and trailing slash
/// stripped, `www.` dropped, lowercased. The only safe comparator when
/// matching scraper output back to search hits.
pub fn normalize_profile_url(url: &str) -> String {
    let mut url = url.trim().to_lowercase();

    for sep in ['?', '#'] {
        if let Some(idx) = url.find(sep) {
            url.truncate(idx);
        }
    }
    let url = url.trim_end_matches('/');

    let url = if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{url}")
    };

    url.replace("https://www.linkedin.com/", "https://linkedin.com/")
        .replace("http://www.linkedin.com/", "https://linkedin.com/")
        .replace("http://linkedin.com/", "https://linkedin.com/")
}

/// The search query used to find one business's profile.
pub fn build_search_query(business_name: &str, city: Option<&str>) -> String {
    match city {
        Some(city) if !city.is_empty() => format!("\"{business_name}\" site:linkedin.com {city}"),
        _ => format!("\"{business_name}\" site:linkedin.com"),
    }
}

/// First organic hit pointing at a profile or company page.
pub fn first_profile_hit(page: &GoogleSearchPage) -> Option<String> {
    page.organic_results.iter().find_map(|result| {
        let url = result.url.as_deref()?;
        if url.contains("linkedin.com") && (url.contains("/in/") || url.contains("/company/")) {
            Some(url.to_string())
        } else {
            None
        }
    })
}

/// The mailbox domain from a business website, rejecting social platforms
/// and map URLs that cannot receive mail.
pub fn email_domain_from_website(website: &str) -> Option<String> {
    let parsed = url::Url::parse(website)
        .or_else(|_| url::Url::parse(&format!("https://{website}")))
        .ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    if NON_BUSINESS_DOMAINS.iter().any(|d| host.ends_with(d)) {
        return None;
    }
    if host.contains("google.") {
        return None;
    }
    Some(host)
}

/// Common mailbox patterns from a person's name and a business domain:
/// `first@`, `first.last@`, `flast@`, `firstlast@`, `last@`, `f.last@`,
/// plus the `contact@`/`info@` catch-alls.
pub fn generate_pattern_emails(full_name: &str, website: &str) -> Vec<String> {
    let Some(domain) = email_domain_from_website(website) else {
        return Vec::new();
    };

    let parts: Vec<String> = full_name
        .split_whitespace()
        .map(|p| {
            p.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|p| !p.is_empty())
        .collect();

    let mut patterns = Vec::new();
    match parts.as_slice() {
        [] => {}
        [first] => patterns.push(format!("{first}@{domain}")),
        [first, .., last] => {
            let initial = &first[..1];
            patterns.push(format!("{first}@{domain}"));
            patterns.push(format!("{first}.{last}@{domain}"));
            patterns.push(format!("{initial}{last}@{domain}"));
            patterns.push(format!("{first}{last}@{domain}"));
            patterns.push(format!("{last}@{domain}"));
            patterns.push(format!("{initial}.{last}@{domain}"));
        }
    }
    patterns.push(format!("contact@{domain}"));
    patterns.push(format!("info@{domain}"));
    patterns
}

pub struct ProfessionalScraper {
    apify: Arc<ApifyClient>,
    governor: Arc<RateGovernor>,
}

impl ProfessionalScraper {
    pub fn new(apify: Arc<ApifyClient>, governor: Arc<RateGovernor>) -> Self {
        Self { apify, governor }
    }

    /// One batch Google search for many businesses. Returns search term →
    /// profile URL for the hits that resolved.
    pub async fn find_profile_urls(&self, queries: &[String]) -> Result<HashMap<String, String>> {
        self.governor.wait_for_service(ServiceKind::Apify).await;
        let pages = self.apify.search_google(queries).await?;

        let mut found = HashMap::new();
        for page in &pages {
            let Some(term) = page.search_query.as_ref().and_then(|q| q.term.clone()) else {
                continue;
            };
            if let Some(url) = first_profile_hit(page) {
                found.insert(term, url);
            }
        }
        info!(queries = queries.len(), resolved = found.len(), "Profile search complete");
        Ok(found)
    }

    /// Scrape a batch of same-kind profile URLs. Returns normalized URL →
    /// profile item.
    pub async fn scrape_profiles(
        &self,
        kind: ProfileKind,
        urls: &[String],
    ) -> Result<HashMap<String, LinkedInItem>> {
        if urls.is_empty() {
            return Ok(HashMap::new());
        }
        self.governor.wait_for_service(ServiceKind::Apify).await;
        let items = match kind {
            ProfileKind::Company => self.apify.scrape_linkedin_companies(urls).await?,
            ProfileKind::Personal => self.apify.scrape_linkedin_profiles(urls).await?,
        };

        let mut by_url = HashMap::new();
        for item in items {
            if let Some(url) = item.any_url() {
                by_url.insert(normalize_profile_url(url), item);
            }
        }
        info!(kind = kind.as_str(), requested = urls.len(), returned = by_url.len(), "Profiles scraped");
        Ok(by_url)
    }

    /// Extract public emails from personal profiles (tier-2 source).
    /// Low hit rate, high quality.
    pub async fn extract_verified_emails(
        &self,
        urls: &[String],
    ) -> Result<HashMap<String, ProfileEmailItem>> {
        if urls.is_empty() {
            return Ok(HashMap::new());
        }
        self.governor.wait_for_service(ServiceKind::Apify).await;
        let items = self.apify.extract_profile_emails(urls).await?;

        let mut by_url = HashMap::new();
        for item in items {
            if let Some(url) = item.any_url() {
                by_url.insert(normalize_profile_url(url), item);
            }
        }
        Ok(by_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_urls_normalize_to_one_form() {
        let expected = "https://linkedin.com/in/jane-doe";
        assert_eq!(normalize_profile_url("https://www.linkedin.com/in/Jane-Doe/"), expected);
        assert_eq!(normalize_profile_url("linkedin.com/in/jane-doe?trk=search"), expected);
        assert_eq!(normalize_profile_url("http://linkedin.com/in/jane-doe"), expected);
    }

    #[test]
    fn profile_kind_from_path() {
        assert_eq!(profile_kind("https://linkedin.com/in/jane"), Some(ProfileKind::Personal));
        assert_eq!(
            profile_kind("https://linkedin.com/company/acme"),
            Some(ProfileKind::Company)
        );
        assert_eq!(profile_kind("https://linkedin.com/feed"), None);
    }

    #[test]
    fn search_query_quotes_name_and_appends_city() {
        assert_eq!(
            build_search_query("Acme Dental", Some("Austin")),
            "\"Acme Dental\" site:linkedin.com Austin"
        );
        assert_eq!(
            build_search_query("Acme Dental", None),
            "\"Acme Dental\" site:linkedin.com"
        );
    }

    #[test]
    fn first_profile_hit_skips_non_profile_results() {
        let page: GoogleSearchPage = serde_json::from_value(json!({
            "searchQuery": {"term": "q"},
            "organicResults": [
                {"title": "About", "url": "https://linkedin.com/pulse/article"},
                {"title": "Acme", "url": "https://www.linkedin.com/company/acme"},
            ]
        }))
        .unwrap();
        assert_eq!(
            first_profile_hit(&page).as_deref(),
            Some("https://www.linkedin.com/company/acme")
        );
    }

    #[test]
    fn pattern_emails_cover_documented_shapes() {
        let patterns = generate_pattern_emails("Jane Doe", "https://www.acmedental.com");
        assert_eq!(
            patterns,
            vec![
                "jane@acmedental.com",
                "jane.doe@acmedental.com",
                "jdoe@acmedental.com",
                "janedoe@acmedental.com",
                "doe@acmedental.com",
                "j.doe@acmedental.com",
                "contact@acmedental.com",
                "info@acmedental.com",
            ]
        );
    }

    #[test]
    fn pattern_emails_reject_social_and_map_domains() {
        assert!(generate_pattern_emails("Jane Doe", "https://facebook.com/acme").is_empty());
        assert!(generate_pattern_emails("Jane Doe", "https://www.linkedin.com/company/acme").is_empty());
        assert!(generate_pattern_emails("Jane Doe", "https://google.com/maps/place/x").is_empty());
        assert!(generate_pattern_emails("Jane", "not a url at all").is_empty());
    }

    #[test]
    fn single_name_still_yields_catchalls() {
        let patterns = generate_pattern_emails("Cher", "acme.com");
        assert_eq!(
            patterns,
            vec!["cher@acme.com", "contact@acme.com", "info@acme.com"]
        );
    }
}
