//! Process-wide regulator for all outbound calls: per-service token buckets,
//! a per-domain minimum-delay throttle, and a failing-domain blocklist.
//!
//! Locking is per bucket and per domain entry; there is no global lock on
//! the wait paths. Domain entries hold their mutex across the throttle
//! sleep so concurrent requests to one domain serialize.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[error("Domain {0} is blocked after repeated failures")]
pub struct DomainBlocked(pub String);

/// The external services with independent token buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    OpenAiHeavy,
    OpenAiLight,
    Apify,
    Verifier,
}

struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate: f64, capacity: f64) -> Self {
        Self {
            rate,
            capacity,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Refill for elapsed time, then either consume one token (None) or
    /// report how long the caller must wait before trying again.
    fn try_consume(&mut self) -> Option<Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return None;
        }
        Some(Duration::from_secs_f64((1.0 - self.tokens) / self.rate))
    }
}

#[derive(Default)]
struct DomainState {
    last_request: Option<Instant>,
    consecutive_failures: u32,
    blocked: bool,
}

pub struct RateGovernor {
    openai_heavy: Mutex<TokenBucket>,
    openai_light: Mutex<TokenBucket>,
    apify: Mutex<TokenBucket>,
    verifier: Mutex<TokenBucket>,
    domains: Mutex<HashMap<String, Arc<Mutex<DomainState>>>>,
    min_domain_delay: Duration,
    failure_threshold: u32,
}

impl RateGovernor {
    pub fn new(min_domain_delay: Duration, failure_threshold: u32) -> Self {
        Self {
            // RPM limits converted to per-second rates, with burst headroom
            openai_heavy: Mutex::new(TokenBucket::new(10_000.0 / 60.0, 100.0)),
            openai_light: Mutex::new(TokenBucket::new(30_000.0 / 60.0, 200.0)),
            apify: Mutex::new(TokenBucket::new(1.0, 5.0)),
            verifier: Mutex::new(TokenBucket::new(10.0, 10.0)),
            domains: Mutex::new(HashMap::new()),
            min_domain_delay,
            failure_threshold,
        }
    }

    /// Block until a token for the service is available. Never errors.
    pub async fn wait_for_service(&self, service: ServiceKind) {
        let bucket = match service {
            ServiceKind::OpenAiHeavy => &self.openai_heavy,
            ServiceKind::OpenAiLight => &self.openai_light,
            ServiceKind::Apify => &self.apify,
            ServiceKind::Verifier => &self.verifier,
        };

        loop {
            let delay = bucket.lock().await.try_consume();
            match delay {
                None => return,
                Some(d) => {
                    debug!(?service, wait_ms = d.as_millis() as u64, "Rate limit wait");
                    tokio::time::sleep(d).await;
                }
            }
        }
    }

    async fn domain_entry(&self, domain: &str) -> Arc<Mutex<DomainState>> {
        let mut domains = self.domains.lock().await;
        domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(DomainState::default())))
            .clone()
    }

    /// Enforce the minimum gap between consecutive requests to one hostname.
    /// Errors immediately if the domain is blocklisted.
    pub async fn wait_for_domain(&self, domain: &str) -> Result<(), DomainBlocked> {
        let entry = self.domain_entry(domain).await;
        let mut state = entry.lock().await;

        if state.blocked {
            return Err(DomainBlocked(domain.to_string()));
        }

        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_domain_delay {
                let wait = self.min_domain_delay - elapsed;
                debug!(domain, wait_ms = wait.as_millis() as u64, "Domain throttle wait");
                tokio::time::sleep(wait).await;
            }
        }

        state.last_request = Some(Instant::now());
        Ok(())
    }

    /// Record a failed request. The domain is blocklisted after the
    /// configured number of consecutive failures.
    pub async fn mark_domain_failed(&self, domain: &str) {
        let entry = self.domain_entry(domain).await;
        let mut state = entry.lock().await;
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.failure_threshold && !state.blocked {
            state.blocked = true;
            warn!(
                domain,
                failures = state.consecutive_failures,
                "Domain blocklisted"
            );
        }
    }

    /// Record a successful request, resetting the failure streak.
    pub async fn mark_domain_succeeded(&self, domain: &str) {
        let entry = self.domain_entry(domain).await;
        let mut state = entry.lock().await;
        state.consecutive_failures = 0;
    }

    pub async fn is_domain_blocked(&self, domain: &str) -> bool {
        let entry = self.domain_entry(domain).await;
        let state = entry.lock().await;
        state.blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_beyond_capacity_is_paced() {
        // 2 tokens/s, capacity 3: 10 calls must take at least (10-3)/2 = 3.5s.
        let governor = RateGovernor::new(Duration::from_secs(2), 3);
        {
            let mut bucket = governor.apify.lock().await;
            *bucket = TokenBucket::new(2.0, 3.0);
        }

        let start = Instant::now();
        for _ in 0..10 {
            governor.wait_for_service(ServiceKind::Apify).await;
        }
        assert!(start.elapsed() >= Duration::from_secs_f64(3.5));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_within_capacity_pass_immediately() {
        let governor = RateGovernor::new(Duration::from_secs(2), 3);
        let start = Instant::now();
        for _ in 0..5 {
            governor.wait_for_service(ServiceKind::Apify).await;
        }
        // Capacity is 5 for the apify bucket, so no waiting.
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn domain_gap_is_enforced() {
        let governor = RateGovernor::new(Duration::from_secs(2), 3);

        let start = Instant::now();
        governor.wait_for_domain("example.com").await.unwrap();
        governor.wait_for_domain("example.com").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));

        // A different domain is independent.
        let start = Instant::now();
        governor.wait_for_domain("other.com").await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn blocklist_after_consecutive_failures() {
        let governor = RateGovernor::new(Duration::from_millis(1), 3);

        governor.mark_domain_failed("dead.com").await;
        governor.mark_domain_failed("dead.com").await;
        assert!(!governor.is_domain_blocked("dead.com").await);

        governor.mark_domain_failed("dead.com").await;
        assert!(governor.is_domain_blocked("dead.com").await);
        assert!(governor.wait_for_domain("dead.com").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_streak() {
        let governor = RateGovernor::new(Duration::from_millis(1), 3);

        governor.mark_domain_failed("flaky.com").await;
        governor.mark_domain_failed("flaky.com").await;
        governor.mark_domain_succeeded("flaky.com").await;
        governor.mark_domain_failed("flaky.com").await;
        assert!(!governor.is_domain_blocked("flaky.com").await);
    }
}
