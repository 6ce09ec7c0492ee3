//! Business-website scraping for writer context: fetch the homepage plus a
//! couple of same-domain contact/about pages, strip to text, and summarize
//! with the light model. All fetches go through the domain throttle and
//! respect the failing-domain blocklist.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info, warn};

use ai_client::OpenAi;
use leadscout_common::retry::send_with_retry;

use crate::govern::{RateGovernor, ServiceKind};

/// Same-domain pages besides the homepage worth reading for contact signals.
const INTERESTING_PATHS: [&str; 4] = ["/about", "/about-us", "/contact", "/services"];

/// How many pages (homepage included) to fetch per site.
const MAX_PAGES_PER_SITE: usize = 3;

/// Page text is clipped to this length before summarization.
const SUMMARY_INPUT_CAP: usize = 4_000;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<script.*?</script>|<style.*?</style>|<[^>]+>").expect("valid regex"))
}

fn href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href=["']([^"']+)["']"#).expect("valid regex"))
}

/// Strip markup and collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let stripped = tag_regex().replace_all(html, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Same-domain links worth following, matched against the interesting paths.
pub fn interesting_links(base_url: &url::Url, html: &str) -> Vec<String> {
    let mut links = Vec::new();
    for capture in href_regex().captures_iter(html) {
        let href = &capture[1];
        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        if resolved.host_str() != base_url.host_str() {
            continue;
        }
        let path = resolved.path().trim_end_matches('/').to_lowercase();
        if INTERESTING_PATHS.iter().any(|p| path.ends_with(p)) {
            let as_string = resolved.to_string();
            if !links.contains(&as_string) {
                links.push(as_string);
            }
        }
        if links.len() >= MAX_PAGES_PER_SITE - 1 {
            break;
        }
    }
    links
}

pub struct WebsiteScraper {
    http: reqwest::Client,
    llm: OpenAi,
    governor: Arc<RateGovernor>,
}

impl WebsiteScraper {
    pub fn new(llm: OpenAi, governor: Arc<RateGovernor>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent("Mozilla/5.0 (compatible; lead-research)")
                .build()
                .unwrap_or_default(),
            llm,
            governor,
        }
    }

    /// Fetch and summarize a business website. A blocked or failing domain
    /// yields an empty list, never an error; the writer falls back to
    /// category/location signals.
    pub async fn summarize_site(&self, website: &str) -> Vec<String> {
        let Ok(base_url) = url::Url::parse(website) else {
            debug!(website, "Unparseable website URL");
            return Vec::new();
        };
        let Some(domain) = base_url.host_str().map(|h| h.to_string()) else {
            return Vec::new();
        };

        let Some(homepage) = self.fetch_page(&domain, website).await else {
            return Vec::new();
        };

        let mut texts = vec![html_to_text(&homepage)];
        for link in interesting_links(&base_url, &homepage) {
            if let Some(html) = self.fetch_page(&domain, &link).await {
                texts.push(html_to_text(&html));
            }
        }

        let mut summaries = Vec::new();
        for text in texts {
            if text.len() < 100 {
                continue;
            }
            match self.summarize(&text).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!(website, error = %e, "Page summarization failed"),
            }
        }
        info!(website, pages = summaries.len(), "Website summarized");
        summaries
    }

    async fn fetch_page(&self, domain: &str, url: &str) -> Option<String> {
        if let Err(e) = self.governor.wait_for_domain(domain).await {
            debug!(domain, error = %e, "Skipping blocked domain");
            return None;
        }

        match send_with_retry(|| self.http.get(url)).await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    self.governor.mark_domain_succeeded(domain).await;
                    Some(body)
                }
                Err(e) => {
                    warn!(url, error = %e, "Failed to read website body");
                    self.governor.mark_domain_failed(domain).await;
                    None
                }
            },
            Ok(response) => {
                debug!(url, status = response.status().as_u16(), "Website returned non-success");
                self.governor.mark_domain_failed(domain).await;
                None
            }
            Err(e) => {
                warn!(url, error = %e, "Website fetch failed");
                self.governor.mark_domain_failed(domain).await;
                None
            }
        }
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        self.governor.wait_for_service(ServiceKind::OpenAiLight).await;

        let clipped: String = text.chars().take(SUMMARY_INPUT_CAP).collect();
        let completion = self
            .llm
            .chat(
                "You summarize business web pages in 2-3 sentences, keeping concrete services, specialties, and anything distinctive.",
                clipped,
            )
            .await?;
        Ok(completion.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_is_stripped() {
        let html = "<html><head><style>body{}</style></head>\
                    <body><h1>Acme</h1><script>var x=1;</script><p>Family  dentistry</p></body></html>";
        assert_eq!(html_to_text(html), "Acme Family dentistry");
    }

    #[test]
    fn interesting_links_stay_on_domain() {
        let base = url::Url::parse("https://acme.com").unwrap();
        let html = r#"<a href="/about">About</a>
                      <a href="https://acme.com/contact/">Contact</a>
                      <a href="https://other.com/about">Elsewhere</a>
                      <a href="/blog">Blog</a>"#;
        let links = interesting_links(&base, html);
        assert_eq!(
            links,
            vec![
                "https://acme.com/about".to_string(),
                "https://acme.com/contact/".to_string(),
            ]
        );
    }
}
