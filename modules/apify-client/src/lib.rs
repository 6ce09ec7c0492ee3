pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{
    ApiResponse, EmailExtractorInput, FacebookPageItem, FacebookPagesInput, GoogleSearchInput,
    GoogleSearchPage, LinkedInItem, LinkedInScraperInput, OrganicResult, PlaceItem,
    PlacesScraperInput, ProfileEmailItem, ProxyConfiguration, RunData, StartUrl,
};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for the Google Maps places crawler.
const PLACES_SCRAPER: &str = "nwua9Gu5YrADL7ZDj";

/// Actor ID for the Facebook pages scraper.
const FACEBOOK_PAGES_SCRAPER: &str = "4Hv5RhChiaDk6iwad";

/// Actor slug for apify/google-search-scraper.
const GOOGLE_SEARCH_SCRAPER: &str = "apify~google-search-scraper";

/// Actor slug for the LinkedIn profile/company scraper.
const LINKEDIN_SCRAPER: &str = "bebity~linkedin-premium-actor";

/// Actor ID for the LinkedIn public-email extractor.
const EMAIL_EXTRACTOR: &str = "2SyF0bVxmgGr8IVCZ";

/// Max retry attempts for transient HTTP failures (429, 5xx, network).
const MAX_RETRIES: u32 = 3;

/// How a run is polled: cadence, a wall-clock ceiling, and how long an
/// unchanged RUNNING status is tolerated before the run is abandoned as hung.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub ceiling: Duration,
    pub max_consecutive_running: u32,
}

impl PollConfig {
    pub fn new(interval_secs: u64, ceiling_secs: u64) -> Self {
        let interval = Duration::from_secs(interval_secs);
        // 2 minutes of unchanged RUNNING, expressed in poll ticks
        let max_consecutive_running = (120 / interval_secs.max(1)) as u32;
        Self {
            interval,
            ceiling: Duration::from_secs(ceiling_secs),
            max_consecutive_running,
        }
    }
}

pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    /// Send a request, retrying 429 and 5xx with exponential backoff.
    /// Other 4xx statuses surface immediately.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let mut attempt: u32 = 0;
        loop {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt < MAX_RETRIES {
                        let backoff = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            status = status.as_u16(),
                            attempt = attempt + 1,
                            backoff_secs = backoff.as_secs(),
                            "Apify request failed, retrying after backoff"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ApifyError::Api {
                        status: status.as_u16(),
                        message: body,
                    });
                }
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        let backoff = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            error = %e,
                            attempt = attempt + 1,
                            backoff_secs = backoff.as_secs(),
                            "Apify request errored, retrying after backoff"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize>(&self, actor_id: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", BASE_URL, actor_id);
        let resp = self
            .send_with_retry(|| self.client.post(&url).bearer_auth(&self.token).json(input))
            .await?;

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll a run until it reaches a terminal status.
    ///
    /// `SUCCEEDED` returns the run; `FAILED`/`ABORTED`/`TIMED-OUT` error out
    /// without retry. A status stuck on `RUNNING` past the configured number
    /// of consecutive polls is abandoned; the remote run may still finish,
    /// which is fine because downstream writes are idempotent.
    pub async fn poll_run(&self, actor_id: &str, run_id: &str, cfg: &PollConfig) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs/{}", BASE_URL, actor_id, run_id);
        let started = tokio::time::Instant::now();
        let mut consecutive_running: u32 = 0;
        let mut last_status = String::new();

        loop {
            if started.elapsed() >= cfg.ceiling {
                return Err(ApifyError::PollTimeout {
                    run_id: run_id.to_string(),
                    ceiling_secs: cfg.ceiling.as_secs(),
                });
            }

            let resp = self
                .send_with_retry(|| self.client.get(&url).bearer_auth(&self.token))
                .await?;
            let api_resp: ApiResponse<RunData> = resp.json().await?;
            let run = api_resp.data;

            match run.status.as_str() {
                "SUCCEEDED" => return Ok(run),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    tracing::error!(
                        run_id,
                        status = %run.status,
                        message = run.status_message.as_deref().unwrap_or(""),
                        "Actor run ended unsuccessfully"
                    );
                    return Err(ApifyError::RunFailed(run.status));
                }
                "RUNNING" => {
                    consecutive_running += 1;
                    if consecutive_running >= cfg.max_consecutive_running {
                        return Err(ApifyError::RunStuck {
                            run_id: run_id.to_string(),
                            stuck_secs: consecutive_running as u64 * cfg.interval.as_secs(),
                        });
                    }
                }
                "READY" => {
                    consecutive_running = 0;
                }
                other => {
                    tracing::warn!(run_id, status = other, "Unknown run status, continuing to poll");
                    consecutive_running = 0;
                }
            }

            if run.status != last_status {
                tracing::debug!(run_id, status = %run.status, "Run status");
                last_status = run.status;
            }

            tokio::time::sleep(cfg.interval).await;
        }
    }

    /// Fetch dataset items as raw JSON values.
    pub async fn get_dataset_items_raw(&self, dataset_id: &str) -> Result<Vec<Value>> {
        let url = format!("{}/datasets/{}/items?format=json", BASE_URL, dataset_id);
        let resp = self
            .send_with_retry(|| self.client.get(&url).bearer_auth(&self.token))
            .await?;

        let items: Vec<Value> = resp.json().await?;
        Ok(items)
    }

    /// Start a run, poll to completion, fetch its dataset as raw JSON.
    pub async fn run_and_collect<I: Serialize>(
        &self,
        actor_id: &str,
        input: &I,
        cfg: &PollConfig,
    ) -> Result<Vec<Value>> {
        let run = self.start_run(actor_id, input).await?;
        tracing::info!(actor_id, run_id = %run.id, "Actor run started, polling for completion");

        let completed = self.poll_run(actor_id, &run.id, cfg).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        self.get_dataset_items_raw(&completed.default_dataset_id)
            .await
    }

    /// Authentication probe against the account endpoint.
    pub async fn test_connection(&self) -> bool {
        let url = format!("{}/users/me", BASE_URL);
        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Actor platform probe failed");
                false
            }
        }
    }

    /// Search Google Maps for businesses. One run may carry queries for many
    /// ZIPs; each returned item is later attributed to the ZIP in its own
    /// address, not the query it came from.
    pub async fn scrape_places(
        &self,
        queries: &[String],
        max_per_search: u32,
    ) -> Result<Vec<(PlaceItem, Value)>> {
        tracing::info!(queries = queries.len(), max_per_search, "Starting places scrape");

        let input = PlacesScraperInput {
            search_strings_array: queries.to_vec(),
            max_crawled_places_per_search: max_per_search,
            language: "en".to_string(),
        };

        let raw = self
            .run_and_collect(PLACES_SCRAPER, &input, &PollConfig::new(5, 600))
            .await?;
        Ok(parse_keeping_raw(raw, "places"))
    }

    /// Scrape a batch of Facebook page URLs. Each item is returned with its
    /// raw payload so enrichment rows can persist the full response.
    pub async fn scrape_facebook_pages(
        &self,
        urls: &[String],
    ) -> Result<Vec<(FacebookPageItem, Value)>> {
        tracing::info!(pages = urls.len(), "Starting Facebook pages scrape");

        let input = FacebookPagesInput {
            start_urls: urls.iter().map(|u| StartUrl { url: u.clone() }).collect(),
        };

        let raw = self
            .run_and_collect(FACEBOOK_PAGES_SCRAPER, &input, &PollConfig::new(5, 600))
            .await?;
        Ok(parse_keeping_raw(raw, "facebook"))
    }

    /// Run a batch of Google searches (newline-joined into one actor input).
    pub async fn search_google(&self, queries: &[String]) -> Result<Vec<GoogleSearchPage>> {
        tracing::info!(queries = queries.len(), "Starting Google search batch");

        let input = GoogleSearchInput {
            queries: queries.join("\n"),
            results_per_page: 10,
            max_pages_per_query: 1,
        };

        let raw = self
            .run_and_collect(GOOGLE_SEARCH_SCRAPER, &input, &PollConfig::new(5, 120))
            .await?;
        Ok(parse_items(raw, "google_search"))
    }

    /// Scrape LinkedIn company pages (`/company/…` URLs).
    pub async fn scrape_linkedin_companies(&self, urls: &[String]) -> Result<Vec<LinkedInItem>> {
        self.scrape_linkedin("get-companies", urls).await
    }

    /// Scrape personal LinkedIn profiles (`/in/…` URLs).
    pub async fn scrape_linkedin_profiles(&self, urls: &[String]) -> Result<Vec<LinkedInItem>> {
        self.scrape_linkedin("get-profiles", urls).await
    }

    async fn scrape_linkedin(&self, action: &str, urls: &[String]) -> Result<Vec<LinkedInItem>> {
        tracing::info!(action, urls = urls.len(), "Starting LinkedIn scrape");

        let input = LinkedInScraperInput {
            action: action.to_string(),
            keywords: urls.to_vec(),
            is_url: true,
            is_name: false,
            limit: urls.len() as u32,
        };

        let raw = self
            .run_and_collect(LINKEDIN_SCRAPER, &input, &PollConfig::new(5, 120))
            .await?;
        Ok(parse_items(raw, "linkedin"))
    }

    /// Extract public emails/phones from LinkedIn profile URLs.
    pub async fn extract_profile_emails(&self, urls: &[String]) -> Result<Vec<ProfileEmailItem>> {
        tracing::info!(urls = urls.len(), "Starting profile email extraction");

        let input = EmailExtractorInput {
            profile_urls: urls.to_vec(),
            proxy_configuration: ProxyConfiguration {
                use_apify_proxy: true,
            },
        };

        let raw = self
            .run_and_collect(EMAIL_EXTRACTOR, &input, &PollConfig::new(10, 300))
            .await?;
        Ok(parse_items(raw, "email_extractor"))
    }
}

/// Deserialize dataset rows, skipping (and logging) malformed ones rather
/// than failing the whole batch.
fn parse_items<T: DeserializeOwned>(raw: Vec<Value>, actor: &str) -> Vec<T> {
    let total = raw.len();
    let parsed: Vec<T> = raw
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(actor, error = %e, "Skipping malformed dataset row");
                None
            }
        })
        .collect();
    if parsed.len() < total {
        tracing::warn!(actor, skipped = total - parsed.len(), total, "Some dataset rows were skipped");
    }
    parsed
}

/// Like `parse_items`, but keeps the raw JSON alongside the typed item so
/// callers can persist the full payload and run bag extractors over it.
fn parse_keeping_raw<T: DeserializeOwned>(raw: Vec<Value>, actor: &str) -> Vec<(T, Value)> {
    raw.into_iter()
        .filter_map(|v| match serde_json::from_value::<T>(v.clone()) {
            Ok(item) => Some((item, v)),
            Err(e) => {
                tracing::warn!(actor, error = %e, "Skipping malformed dataset row");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_config_running_budget_scales_with_interval() {
        let cfg = PollConfig::new(5, 600);
        assert_eq!(cfg.max_consecutive_running, 24);
        let cfg = PollConfig::new(10, 300);
        assert_eq!(cfg.max_consecutive_running, 12);
    }

    #[test]
    fn parse_items_skips_bad_rows() {
        let rows = vec![
            serde_json::json!({"title": "Good", "categories": []}),
            serde_json::json!({"title": 42, "categories": "not-a-list"}),
        ];
        let parsed: Vec<PlaceItem> = parse_items(rows, "places");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title.as_deref(), Some("Good"));
    }
}
