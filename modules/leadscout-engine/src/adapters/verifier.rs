//! Deliverability verification client. The provider has no synchronous
//! batch endpoint, so batches run serially with a small spacing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::Value;
use tracing::{info, warn};

use leadscout_common::retry::send_with_retry;
use leadscout_common::{VerificationRecord, VerificationStatus};

use crate::govern::{RateGovernor, ServiceKind};

const VERIFIER_BASE_URL: &str = "https://api.usebouncer.com/v1.1";

/// Gap between consecutive single-email requests in a batch.
const BATCH_SPACING: Duration = Duration::from_millis(100);

/// Deliverable with a score of at least this is considered safe to mail.
const SAFE_SCORE_FLOOR: i32 = 70;

pub struct EmailVerifier {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    governor: Arc<RateGovernor>,
}

impl EmailVerifier {
    pub fn new(api_key: String, governor: Arc<RateGovernor>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: VERIFIER_BASE_URL.to_string(),
            governor,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Verify one address. Authentication failures surface as errors;
    /// provider hiccups come back as an `error`-status record so callers
    /// can keep the email without a verdict.
    pub async fn verify(&self, email: &str) -> Result<VerificationRecord> {
        self.governor.wait_for_service(ServiceKind::Verifier).await;

        let url = format!("{}/email/verify", self.base_url);
        let response = send_with_retry(|| {
            self.client
                .get(&url)
                .query(&[("email", email)])
                .header("x-api-key", &self.api_key)
        })
        .await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(anyhow!("Verifier rejected API key (status {status})"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(email, status = status.as_u16(), "Verifier error response");
            return Ok(error_record(email, &format!("API error {status}: {body}")));
        }

        let body: Value = response.json().await?;
        Ok(parse_verification(email, body))
    }

    /// Verify a batch serially with spacing. Per-email failures degrade to
    /// `error` records; the batch itself never fails.
    pub async fn verify_batch(&self, emails: &[String]) -> Vec<VerificationRecord> {
        let mut records = Vec::with_capacity(emails.len());
        for (i, email) in emails.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(BATCH_SPACING).await;
            }
            match self.verify(email).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(email, error = %e, "Verification failed");
                    records.push(error_record(email, &e.to_string()));
                }
            }
        }

        let safe = records.iter().filter(|r| r.is_safe).count();
        info!(total = records.len(), safe, "Batch verification complete");
        records
    }

    /// Connectivity probe for the operator self-test.
    pub async fn test_connection(&self) -> bool {
        self.verify("test@example.com").await.is_ok()
    }
}

/// Map the provider payload to a verdict. `is_safe` requires deliverable
/// status and a score at or above the floor.
pub fn parse_verification(email: &str, body: Value) -> VerificationRecord {
    let status_str = body.get("status").and_then(|v| v.as_str()).unwrap_or("unknown");
    let status = match status_str {
        "deliverable" => VerificationStatus::Deliverable,
        "undeliverable" => VerificationStatus::Undeliverable,
        "risky" => VerificationStatus::Risky,
        "error" => VerificationStatus::Error,
        _ => VerificationStatus::Unknown,
    };
    let score = body.get("score").and_then(|v| v.as_i64()).unwrap_or(0) as i32;

    let flag = |key: &str| body.get(key).and_then(|v| v.as_bool()).unwrap_or(false);

    VerificationRecord {
        email: email.to_string(),
        status,
        score,
        is_safe: status == VerificationStatus::Deliverable && score >= SAFE_SCORE_FLOOR,
        is_disposable: flag("is_disposable") || flag("disposable"),
        is_role_based: flag("is_role") || flag("is_role_based"),
        is_free: flag("is_free_email") || flag("free"),
        is_gibberish: flag("is_gibberish"),
        domain: body
            .get("domain")
            .and_then(|d| d.get("name"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        provider: body
            .get("provider")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        raw: body,
    }
}

fn error_record(email: &str, reason: &str) -> VerificationRecord {
    VerificationRecord {
        email: email.to_string(),
        status: VerificationStatus::Error,
        score: 0,
        is_safe: false,
        is_disposable: false,
        is_role_based: false,
        is_free: false,
        is_gibberish: false,
        domain: None,
        provider: None,
        raw: serde_json::json!({"error": reason}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deliverable_above_floor_is_safe() {
        let record = parse_verification(
            "info@acme.com",
            json!({"status": "deliverable", "score": 95, "domain": {"name": "acme.com"}}),
        );
        assert_eq!(record.status, VerificationStatus::Deliverable);
        assert!(record.is_safe);
        assert_eq!(record.domain.as_deref(), Some("acme.com"));
    }

    #[test]
    fn deliverable_below_floor_is_not_safe() {
        let record =
            parse_verification("info@acme.com", json!({"status": "deliverable", "score": 60}));
        assert!(!record.is_safe);
    }

    #[test]
    fn undeliverable_keeps_score_and_flags() {
        let record = parse_verification(
            "x@dead.com",
            json!({"status": "undeliverable", "score": 10, "is_disposable": true, "is_role": true}),
        );
        assert_eq!(record.status, VerificationStatus::Undeliverable);
        assert!(!record.is_safe);
        assert!(record.is_disposable);
        assert!(record.is_role_based);
    }

    #[test]
    fn unknown_payload_degrades_gracefully() {
        let record = parse_verification("x@y.com", json!({}));
        assert_eq!(record.status, VerificationStatus::Unknown);
        assert_eq!(record.score, 0);
        assert!(!record.is_safe);
    }
}
