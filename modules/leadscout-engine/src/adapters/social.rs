//! Facebook-page enrichment adapter: URL normalization, batch page scrapes,
//! and contact extraction from the loose page payload.

use std::sync::Arc;

use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::info;

use apify_client::{ApifyClient, FacebookPageItem};
use leadscout_common::SocialEnrichment;

use crate::govern::{RateGovernor, ServiceKind};

/// Preferred mailbox prefixes when picking the primary page email.
const PREFERRED_PREFIXES: [&str; 4] = ["info@", "contact@", "hello@", "support@"];

/// Substrings marking platform-internal or undeliverable addresses.
const GENERIC_MARKERS: [&str; 7] = [
    "noreply",
    "no-reply",
    "donotreply",
    "example.com",
    "@facebook.com",
    "@instagram.com",
    "@twitter.com",
];

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
    })
}

/// Canonical form of a Facebook page URL: lowercase, `https://www.facebook.com`
/// host, no trailing slash, no query or fragment. The only safe comparator
/// for page identity; raw URL equality is not.
pub fn normalize_facebook_url(url: &str) -> String {
    let mut url = url.trim().to_lowercase();

    for sep in ['?', '#'] {
        if let Some(idx) = url.find(sep) {
            url.truncate(idx);
        }
    }

    for prefix in [
        "https://www.facebook.com/",
        "https://facebook.com/",
        "http://www.facebook.com/",
        "http://facebook.com/",
        "https://m.facebook.com/",
        "http://m.facebook.com/",
        "www.facebook.com/",
        "facebook.com/",
        "m.facebook.com/",
    ] {
        if let Some(rest) = url.strip_prefix(prefix) {
            url = format!("https://www.facebook.com/{rest}");
            break;
        }
    }

    url.trim_end_matches('/').to_string()
}

/// Whether an address is worth keeping (syntactically valid, not a
/// platform-internal mailbox).
pub fn is_usable_email(email: &str) -> bool {
    let lowered = email.to_lowercase();
    email_regex().is_match(&lowered) && !GENERIC_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Pick the primary address: an `info@`-style mailbox if present, else the
/// first usable one.
pub fn pick_primary_email(emails: &[String]) -> Option<String> {
    emails
        .iter()
        .find(|e| {
            let lowered = e.to_lowercase();
            PREFERRED_PREFIXES.iter().any(|p| lowered.contains(p))
        })
        .or_else(|| emails.first())
        .cloned()
}

fn push_email(emails: &mut Vec<String>, candidate: &str) {
    let candidate = candidate.trim();
    if is_usable_email(candidate) && !emails.iter().any(|e| e.eq_ignore_ascii_case(candidate)) {
        emails.push(candidate.to_string());
    }
}

fn scan_text_for_emails(emails: &mut Vec<String>, text: &str) {
    for m in email_regex().find_iter(text) {
        push_email(emails, m.as_str());
    }
}

/// Gather the page's contact data: root fields first (the actor returns the
/// page email at root level), then the `about`/`info`/`contactInfo` sections
/// and service descriptions.
pub fn extract_contact(page: &FacebookPageItem, raw: Value) -> SocialEnrichment {
    let mut emails: Vec<String> = Vec::new();
    let mut phones: Vec<String> = Vec::new();
    let mut addresses: Vec<String> = Vec::new();

    if let Some(ref email) = page.email {
        push_email(&mut emails, email);
    }
    if let Some(ref phone) = page.phone {
        if !phone.is_empty() {
            phones.push(phone.clone());
        }
    }
    if let Some(ref address) = page.address {
        if !address.is_empty() {
            addresses.push(address.clone());
        }
    }

    if let Some(about) = page.about.as_ref().and_then(|v| v.as_object()) {
        if let Some(email) = about.get("email").and_then(|v| v.as_str()) {
            push_email(&mut emails, email);
        }
        if let Some(email) = about
            .get("contactInfo")
            .and_then(|v| v.get("email"))
            .and_then(|v| v.as_str())
        {
            push_email(&mut emails, email);
        }
        if let Some(description) = about.get("description").and_then(|v| v.as_str()) {
            scan_text_for_emails(&mut emails, description);
        }
    }

    if let Some(info) = page.info.as_ref().and_then(|v| v.as_object()) {
        if let Some(email) = info.get("email").and_then(|v| v.as_str()) {
            push_email(&mut emails, email);
        }
        if let Some(phone) = info.get("phone").and_then(|v| v.as_str()) {
            if !phones.iter().any(|p| p == phone) {
                phones.push(phone.to_string());
            }
        }
        if let Some(address) = info.get("address").and_then(|v| v.as_str()) {
            if !addresses.iter().any(|a| a == address) {
                addresses.push(address.to_string());
            }
        }
    }

    if let Some(contact) = page.contact_info.as_ref().and_then(|v| v.as_object()) {
        if let Some(email) = contact.get("email").and_then(|v| v.as_str()) {
            push_email(&mut emails, email);
        }
        if let Some(phone) = contact.get("phone").and_then(|v| v.as_str()) {
            if !phones.iter().any(|p| p == phone) {
                phones.push(phone.to_string());
            }
        }
    }

    for service in &page.services {
        if let Some(description) = service.get("description").and_then(|v| v.as_str()) {
            scan_text_for_emails(&mut emails, description);
        }
    }

    let primary_email = pick_primary_email(&emails);
    let success = primary_email.is_some();

    SocialEnrichment {
        facebook_url: page.any_url().map(normalize_facebook_url),
        page_name: page.any_name().map(|s| s.to_string()),
        page_likes: page.likes,
        page_followers: page.followers,
        emails,
        primary_email,
        phone_numbers: phones,
        addresses,
        success,
        raw,
    }
}

pub struct SocialScraper {
    apify: Arc<ApifyClient>,
    governor: Arc<RateGovernor>,
}

impl SocialScraper {
    pub fn new(apify: Arc<ApifyClient>, governor: Arc<RateGovernor>) -> Self {
        Self { apify, governor }
    }

    /// Scrape a deduplicated batch of page URLs. Items come back with their
    /// raw payloads for the enrichment rows.
    pub async fn scrape_pages(&self, urls: &[String]) -> Result<Vec<(FacebookPageItem, Value)>> {
        self.governor.wait_for_service(ServiceKind::Apify).await;
        let pages = self.apify.scrape_facebook_pages(urls).await?;
        info!(requested = urls.len(), returned = pages.len(), "Facebook pages scraped");
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalization_canonicalizes_variants() {
        let expected = "https://www.facebook.com/acmedental";
        assert_eq!(normalize_facebook_url("https://www.facebook.com/AcmeDental/"), expected);
        assert_eq!(normalize_facebook_url("http://facebook.com/acmedental"), expected);
        assert_eq!(normalize_facebook_url("facebook.com/acmedental?ref=page"), expected);
        assert_eq!(normalize_facebook_url("https://m.facebook.com/acmedental#about"), expected);
    }

    #[test]
    fn generic_and_platform_emails_are_filtered() {
        assert!(!is_usable_email("noreply@acme.com"));
        assert!(!is_usable_email("team@facebook.com"));
        assert!(!is_usable_email("not-an-email"));
        assert!(is_usable_email("info@acme.com"));
    }

    #[test]
    fn primary_prefers_info_style_mailboxes() {
        let emails = vec!["jane@acme.com".to_string(), "info@acme.com".to_string()];
        assert_eq!(pick_primary_email(&emails).as_deref(), Some("info@acme.com"));

        let emails = vec!["jane@acme.com".to_string()];
        assert_eq!(pick_primary_email(&emails).as_deref(), Some("jane@acme.com"));

        assert_eq!(pick_primary_email(&[]), None);
    }

    #[test]
    fn extraction_reaches_nested_sections() {
        let raw = json!({
            "pageUrl": "https://facebook.com/AcmeDental/",
            "pageName": "Acme Dental",
            "email": "noreply@facebook.com",
            "about": {
                "description": "Reach us at contact@acmedental.com or call.",
                "contactInfo": {"email": "frontdesk@acmedental.com"}
            },
            "info": {"phone": "555-0100", "address": "1 Main St"},
            "likes": 210
        });
        let page: FacebookPageItem = serde_json::from_value(raw.clone()).unwrap();
        let enrichment = extract_contact(&page, raw);

        assert_eq!(
            enrichment.facebook_url.as_deref(),
            Some("https://www.facebook.com/acmedental")
        );
        // Platform email filtered; contact@ preferred as primary.
        assert_eq!(enrichment.primary_email.as_deref(), Some("contact@acmedental.com"));
        assert!(enrichment.emails.contains(&"frontdesk@acmedental.com".to_string()));
        assert_eq!(enrichment.phone_numbers, vec!["555-0100".to_string()]);
        assert!(enrichment.success);
    }

    #[test]
    fn empty_page_yields_failed_attempt() {
        let raw = json!({"pageUrl": "https://facebook.com/ghost"});
        let page: FacebookPageItem = serde_json::from_value(raw.clone()).unwrap();
        let enrichment = extract_contact(&page, raw);
        assert!(!enrichment.success);
        assert!(enrichment.primary_email.is_none());
    }
}
