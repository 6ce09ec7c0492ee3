//! Shared retrying HTTP helper for the thin REST clients (verifier, website
//! fetches). Exponential backoff `2^attempt` seconds; retries 429 and 5xx,
//! never other 4xx.

use std::time::Duration;

pub const MAX_RETRIES: u32 = 3;

/// Send a request built by `build`, retrying transient failures.
/// Returns the first successful (or permanently failed) response.
pub async fn send_with_retry(
    build: impl Fn() -> reqwest::RequestBuilder,
) -> reqwest::Result<reqwest::Response> {
    let mut attempt: u32 = 0;
    loop {
        match build().send().await {
            Ok(resp) => {
                let status = resp.status();
                let retryable = status.as_u16() == 429 || status.is_server_error();
                if retryable && attempt < MAX_RETRIES {
                    let backoff = Duration::from_secs(2u64.pow(attempt));
                    tracing::warn!(
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        "HTTP request failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(e) => {
                if attempt < MAX_RETRIES {
                    let backoff = Duration::from_secs(2u64.pow(attempt));
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        "HTTP request errored, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }
                return Err(e);
            }
        }
    }
}
