use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use leadscout_common::{Campaign, CampaignStatus, CoverageProfile};

/// A row from the campaigns table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignRow {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub name: String,
    pub location: String,
    pub keywords: Vec<String>,
    pub profile: String,
    pub template: Option<String>,
    pub status: String,
    pub coverage_target: f64,
    pub total_businesses_found: i64,
    pub total_emails_found: i64,
    pub total_facebook_pages: i64,
    pub estimated_cost: f64,
    pub map_cost: f64,
    pub facebook_cost: f64,
    pub linkedin_cost: f64,
    pub verifier_cost: f64,
    pub llm_cost: f64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignRow {
    pub fn status(&self) -> CampaignStatus {
        CampaignStatus::parse(&self.status).unwrap_or(CampaignStatus::Draft)
    }

    pub fn profile(&self) -> CoverageProfile {
        CoverageProfile::parse(&self.profile).unwrap_or(CoverageProfile::Balanced)
    }

    pub fn actual_cost(&self) -> f64 {
        self.map_cost + self.facebook_cost + self.linkedin_cost + self.verifier_cost + self.llm_cost
    }

    pub fn to_domain(&self) -> Campaign {
        Campaign {
            id: self.id,
            name: self.name.clone(),
            location: self.location.clone(),
            keywords: self.keywords.clone(),
            profile: self.profile(),
            status: self.status(),
            template: self.template.clone(),
            organization_id: self.organization_id,
            total_businesses_found: self.total_businesses_found,
            total_emails_found: self.total_emails_found,
            total_facebook_pages: self.total_facebook_pages,
            error_message: self.error_message.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            updated_at: self.updated_at,
        }
    }
}

/// A (campaign, ZIP) coverage cell. Immutable once scraped.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CoverageRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub zip_code: String,
    pub keywords: Vec<String>,
    pub max_results: i32,
    pub estimated_businesses: Option<i32>,
    pub scraped: bool,
    pub businesses_found: i32,
    pub emails_found: i32,
    pub cost: f64,
    pub scraped_at: Option<DateTime<Utc>>,
}

/// A row from the businesses table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BusinessRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub place_id: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub category: Option<String>,
    pub categories: Vec<String>,
    pub rating: Option<f64>,
    pub reviews_count: Option<i64>,
    pub opening_hours: Option<Value>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub email: Option<String>,
    pub email_source: String,
    pub email_quality_tier: Option<i16>,
    pub email_verified: Option<bool>,
    pub email_verification_score: Option<i32>,
    pub is_women_owned: bool,
    pub is_small_business: bool,
    pub is_veteran_owned: bool,
    pub is_minority_owned: bool,
    pub accepts_credit_cards: bool,
    pub accepts_nfc_payments: bool,
    pub is_wheelchair_accessible: bool,
    pub appointment_required: bool,
    pub has_online_booking: bool,
    pub booking_url: Option<String>,
    pub five_star_percent: Option<f64>,
    pub review_sentiment_tags: Vec<String>,
    pub competitors: Option<Value>,
    pub competitor_count: i32,
    pub contact_first_name: Option<String>,
    pub contact_last_name: Option<String>,
    pub needs_enrichment: bool,
    pub enrichment_status: String,
    pub professional_enriched: bool,
    pub icebreaker: Option<String>,
    pub subject_line: Option<String>,
    pub copy_template: Option<String>,
    pub copy_formula: Option<String>,
    pub copy_variant: Option<i32>,
    pub raw: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity of a persisted enrichment row, for later verification updates.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct EnrichmentId {
    pub id: Uuid,
}
