use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Campaign lifecycle. Exactly one executor may hold `Running` at a time;
/// `Paused` suspends between batches and resumes into `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CampaignStatus::Draft),
            "running" => Some(CampaignStatus::Running),
            "paused" => Some(CampaignStatus::Paused),
            "completed" => Some(CampaignStatus::Completed),
            "failed" => Some(CampaignStatus::Failed),
            _ => None,
        }
    }
}

/// Named preset controlling how many ZIPs a campaign covers and how
/// tightly they pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageProfile {
    Budget,
    Balanced,
    Aggressive,
    Custom,
}

/// Tuning for one coverage profile.
#[derive(Debug, Clone, Copy)]
pub struct ProfileParams {
    /// Fraction of the market the profile aims to reach.
    pub coverage_target: f64,
    pub min_zips: usize,
    /// `None` = unlimited (custom profile).
    pub max_zips: Option<usize>,
    pub default_spacing_miles: f64,
}

impl CoverageProfile {
    pub fn params(&self) -> ProfileParams {
        match self {
            CoverageProfile::Budget => ProfileParams {
                coverage_target: 0.90,
                min_zips: 5,
                max_zips: Some(10),
                default_spacing_miles: 5.0,
            },
            CoverageProfile::Balanced => ProfileParams {
                coverage_target: 0.94,
                min_zips: 10,
                max_zips: Some(25),
                default_spacing_miles: 4.0,
            },
            CoverageProfile::Aggressive => ProfileParams {
                coverage_target: 0.97,
                min_zips: 25,
                max_zips: Some(100),
                default_spacing_miles: 3.0,
            },
            CoverageProfile::Custom => ProfileParams {
                coverage_target: 0.0,
                min_zips: 1,
                max_zips: None,
                default_spacing_miles: 4.0,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageProfile::Budget => "budget",
            CoverageProfile::Balanced => "balanced",
            CoverageProfile::Aggressive => "aggressive",
            CoverageProfile::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "budget" => Some(CoverageProfile::Budget),
            "balanced" => Some(CoverageProfile::Balanced),
            "aggressive" => Some(CoverageProfile::Aggressive),
            "custom" => Some(CoverageProfile::Custom),
            _ => None,
        }
    }
}

/// Where a business's denormalized email came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailSource {
    NotFound,
    GoogleMaps,
    Facebook,
    Linkedin,
}

impl EmailSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailSource::NotFound => "not_found",
            EmailSource::GoogleMaps => "google_maps",
            EmailSource::Facebook => "facebook",
            EmailSource::Linkedin => "linkedin",
        }
    }
}

/// Quality tier of a professional-enrichment email.
/// Verified beats pattern even within the same provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailQualityTier {
    Verified,
    PatternGenerated,
    NotFound,
}

impl EmailQualityTier {
    pub fn as_i16(&self) -> i16 {
        match self {
            EmailQualityTier::Verified => 2,
            EmailQualityTier::PatternGenerated => 4,
            EmailQualityTier::NotFound => 5,
        }
    }

    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            2 => Some(EmailQualityTier::Verified),
            4 => Some(EmailQualityTier::PatternGenerated),
            5 => Some(EmailQualityTier::NotFound),
            _ => None,
        }
    }
}

/// Rank of an email source when deciding whether a newly discovered email
/// displaces the one already on a business. Higher wins.
pub fn email_source_rank(source: EmailSource, tier: Option<EmailQualityTier>) -> u8 {
    match (source, tier) {
        (EmailSource::NotFound, _) => 0,
        (EmailSource::GoogleMaps, _) => 1,
        (EmailSource::Facebook, _) => 2,
        (EmailSource::Linkedin, Some(EmailQualityTier::Verified)) => 4,
        (EmailSource::Linkedin, _) => 3,
    }
}

/// Deliverability verdict from the email verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Deliverable,
    Undeliverable,
    Risky,
    Unknown,
    Error,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Deliverable => "deliverable",
            VerificationStatus::Undeliverable => "undeliverable",
            VerificationStatus::Risky => "risky",
            VerificationStatus::Unknown => "unknown",
            VerificationStatus::Error => "error",
        }
    }
}

/// One verification attempt's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub email: String,
    pub status: VerificationStatus,
    pub score: i32,
    /// `deliverable` with score ≥ 70.
    pub is_safe: bool,
    pub is_disposable: bool,
    pub is_role_based: bool,
    pub is_free: bool,
    pub is_gibberish: bool,
    pub domain: Option<String>,
    pub provider: Option<String>,
    /// Raw verifier response, persisted alongside the verdict.
    pub raw: Value,
}

/// A Facebook-page enrichment result ready for persistence. Produced once
/// per business per attempt, even when nothing was found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialEnrichment {
    pub facebook_url: Option<String>,
    pub page_name: Option<String>,
    pub page_likes: Option<i64>,
    pub page_followers: Option<i64>,
    pub emails: Vec<String>,
    pub primary_email: Option<String>,
    pub phone_numbers: Vec<String>,
    pub addresses: Vec<String>,
    pub success: bool,
    pub raw: Value,
}

/// A professional (LinkedIn) enrichment result ready for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionalEnrichment {
    pub linkedin_url: Option<String>,
    /// "company" or "personal".
    pub profile_type: Option<String>,
    pub profile_found: bool,
    pub person_name: Option<String>,
    pub person_title: Option<String>,
    pub emails_found: Vec<String>,
    pub emails_generated: Vec<String>,
    pub primary_email: Option<String>,
    pub email_quality_tier: EmailQualityTier,
    pub phone: Option<String>,
    pub raw: Value,
}

impl Default for ProfessionalEnrichment {
    fn default() -> Self {
        Self {
            linkedin_url: None,
            profile_type: None,
            profile_found: false,
            person_name: None,
            person_title: None,
            emails_found: Vec::new(),
            emails_generated: Vec::new(),
            primary_email: None,
            email_quality_tier: EmailQualityTier::NotFound,
            phone: None,
            raw: Value::Null,
        }
    }
}

/// Generated outreach copy for one business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCopy {
    pub icebreaker: String,
    pub subject_line: String,
    pub template_used: String,
    pub formula_used: String,
    pub variant: i32,
}

/// A campaign as the engine sees it.
#[derive(Debug, Clone)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub keywords: Vec<String>,
    pub profile: CoverageProfile,
    pub status: CampaignStatus,
    pub template: Option<String>,
    pub organization_id: Option<Uuid>,
    pub total_businesses_found: i64,
    pub total_emails_found: i64,
    pub total_facebook_pages: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_params_match_presets() {
        let p = CoverageProfile::Balanced.params();
        assert_eq!(p.min_zips, 10);
        assert_eq!(p.max_zips, Some(25));
        assert!((p.coverage_target - 0.94).abs() < f64::EPSILON);

        let p = CoverageProfile::Custom.params();
        assert_eq!(p.min_zips, 1);
        assert_eq!(p.max_zips, None);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in [
            CampaignStatus::Draft,
            CampaignStatus::Running,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
            CampaignStatus::Failed,
        ] {
            assert_eq!(CampaignStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(CampaignStatus::parse("archived"), None);
    }

    #[test]
    fn linkedin_verified_outranks_pattern_and_facebook() {
        let verified = email_source_rank(
            EmailSource::Linkedin,
            Some(EmailQualityTier::Verified),
        );
        let pattern = email_source_rank(
            EmailSource::Linkedin,
            Some(EmailQualityTier::PatternGenerated),
        );
        let facebook = email_source_rank(EmailSource::Facebook, None);
        let maps = email_source_rank(EmailSource::GoogleMaps, None);
        assert!(verified > pattern);
        assert!(pattern > facebook);
        assert!(facebook > maps);
        assert!(maps > email_source_rank(EmailSource::NotFound, None));
    }
}
