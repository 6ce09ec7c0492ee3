//! Postgres persistence for campaigns, businesses, and enrichments.
//!
//! Every write is idempotent under retry: businesses upsert on
//! `(campaign_id, place_id)`, coverage cells on `(campaign_id, zip_code)`,
//! and enrichment inserts are append-only attempt records.

use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use leadscout_common::pricing::Service;
use leadscout_common::{
    email_source_rank, CampaignStatus, CoverageProfile, EmailQualityTier, EmailSource,
    GeneratedCopy, ProfessionalEnrichment, SocialEnrichment, VerificationRecord,
};

use crate::error::{Result, StoreError};
use crate::extract;
use crate::rows::{BusinessRow, CampaignRow, CoverageRow, EnrichmentId};

/// Businesses are written in batches of this size.
const INSERT_BATCH_SIZE: usize = 50;

/// Parameters for creating a campaign in `draft`.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub location: String,
    pub keywords: Vec<String>,
    pub profile: CoverageProfile,
    pub template: Option<String>,
    pub organization_id: Option<Uuid>,
    pub coverage_target: f64,
    pub estimated_cost: f64,
}

/// Parameters for one coverage cell.
#[derive(Debug, Clone)]
pub struct NewCoverageCell {
    pub zip_code: String,
    pub keywords: Vec<String>,
    pub max_results: i32,
    pub estimated_businesses: Option<i32>,
}

#[derive(Clone)]
pub struct Repository {
    pool: PgPool,
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // --- Campaigns ---

    pub async fn create_campaign(&self, new: &NewCampaign) -> Result<CampaignRow> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            INSERT INTO campaigns
                (organization_id, name, location, keywords, profile, template,
                 status, coverage_target, estimated_cost)
            VALUES ($1, $2, $3, $4, $5, $6, 'draft', $7, $8)
            RETURNING *
            "#,
        )
        .bind(new.organization_id)
        .bind(&new.name)
        .bind(&new.location)
        .bind(&new.keywords)
        .bind(new.profile.as_str())
        .bind(&new.template)
        .bind(new.coverage_target)
        .bind(new.estimated_cost)
        .fetch_one(&self.pool)
        .await?;

        info!(campaign_id = %row.id, name = %row.name, "Campaign created");
        Ok(row)
    }

    pub async fn get_campaign(&self, id: Uuid) -> Result<CampaignRow> {
        self.find_campaign(id)
            .await?
            .ok_or(StoreError::CampaignNotFound(id))
    }

    pub async fn find_campaign(&self, id: Uuid) -> Result<Option<CampaignRow>> {
        let row = sqlx::query_as::<_, CampaignRow>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Oldest campaign still in `draft`; the scheduler's work queue.
    pub async fn next_draft_campaign(&self) -> Result<Option<CampaignRow>> {
        let row = sqlx::query_as::<_, CampaignRow>(
            "SELECT * FROM campaigns WHERE status = 'draft' ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn set_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2,
                error_message = COALESCE($3, error_message),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_campaign_started(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'running', started_at = now(), error_message = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn finalize_campaign(
        &self,
        id: Uuid,
        status: CampaignStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2, error_message = $3, completed_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Heartbeat: bump `updated_at` so watchdogs can spot a silent campaign.
    /// Logs a warning rather than propagating; a failed heartbeat write
    /// must not interrupt the pipeline.
    pub async fn touch_heartbeat(&self, id: Uuid) {
        let result = sqlx::query("UPDATE campaigns SET updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!(campaign_id = %id, error = %e, "Heartbeat write failed");
        }
    }

    pub async fn update_campaign_totals(
        &self,
        id: Uuid,
        businesses: i64,
        emails: i64,
        facebook_pages: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET total_businesses_found = $2,
                total_emails_found = $3,
                total_facebook_pages = $4,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(businesses)
        .bind(emails)
        .bind(facebook_pages)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overwrite the campaign's email total with the authoritative count.
    pub async fn set_total_emails(&self, id: Uuid, emails: i64) -> Result<()> {
        sqlx::query(
            "UPDATE campaigns SET total_emails_found = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(emails)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Coverage cells ---

    pub async fn add_coverage_cells(
        &self,
        campaign_id: Uuid,
        cells: &[NewCoverageCell],
    ) -> Result<usize> {
        let mut inserted = 0;
        for chunk in cells.chunks(INSERT_BATCH_SIZE) {
            let mut tx = self.pool.begin().await?;
            for cell in chunk {
                let result = sqlx::query(
                    r#"
                    INSERT INTO campaign_coverage
                        (campaign_id, zip_code, keywords, max_results, estimated_businesses)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (campaign_id, zip_code) DO NOTHING
                    "#,
                )
                .bind(campaign_id)
                .bind(&cell.zip_code)
                .bind(&cell.keywords)
                .bind(cell.max_results)
                .bind(cell.estimated_businesses)
                .execute(&mut *tx)
                .await?;
                inserted += result.rows_affected() as usize;
            }
            tx.commit().await?;
        }
        Ok(inserted)
    }

    pub async fn get_coverage(
        &self,
        campaign_id: Uuid,
        scraped: Option<bool>,
    ) -> Result<Vec<CoverageRow>> {
        let rows = match scraped {
            Some(flag) => {
                sqlx::query_as::<_, CoverageRow>(
                    r#"
                    SELECT * FROM campaign_coverage
                    WHERE campaign_id = $1 AND scraped = $2
                    ORDER BY zip_code
                    "#,
                )
                .bind(campaign_id)
                .bind(flag)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CoverageRow>(
                    "SELECT * FROM campaign_coverage WHERE campaign_id = $1 ORDER BY zip_code",
                )
                .bind(campaign_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Mark a cell scraped with its final counts. Immutable afterwards.
    pub async fn update_coverage_status(
        &self,
        campaign_id: Uuid,
        zip_code: &str,
        businesses_found: i32,
        emails_found: i32,
        cost: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaign_coverage
            SET scraped = TRUE,
                businesses_found = $3,
                emails_found = $4,
                cost = $5,
                scraped_at = now()
            WHERE campaign_id = $1 AND zip_code = $2
            "#,
        )
        .bind(campaign_id)
        .bind(zip_code)
        .bind(businesses_found)
        .bind(emails_found)
        .bind(cost)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Businesses ---

    /// Upsert raw map-scraper items for one output ZIP. Derives structured
    /// flags from the raw payload on insert; existing rows keep their
    /// enrichment state and email. Returns the number of rows processed;
    /// callers wanting a durable count should re-query `count_by_zip`.
    pub async fn upsert_businesses(
        &self,
        campaign_id: Uuid,
        organization_id: Option<Uuid>,
        zip_code: &str,
        raw_items: &[Value],
    ) -> Result<usize> {
        let mut processed = 0;

        for chunk in raw_items.chunks(INSERT_BATCH_SIZE) {
            let mut tx = self.pool.begin().await?;
            for raw in chunk {
                let Some(place_id) = raw.get("placeId").and_then(|v| v.as_str()) else {
                    debug!("Skipping business without placeId");
                    continue;
                };
                let Some(name) = raw.get("title").and_then(|v| v.as_str()) else {
                    debug!(place_id, "Skipping business without title");
                    continue;
                };

                let str_field = |key: &str| {
                    raw.get(key)
                        .and_then(|v| v.as_str())
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                };

                let categories: Vec<String> = raw
                    .get("categories")
                    .and_then(|v| v.as_array())
                    .map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str().map(|s| s.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();

                let direct_email = raw
                    .get("emails")
                    .and_then(|v| v.as_array())
                    .and_then(|a| a.first())
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string());

                let attrs = extract::extract_attributes(raw);
                let (has_booking, booking_url) = extract::extract_booking(raw);
                let (five_star_percent, sentiment_tags) = extract::extract_review_metrics(raw);
                let (competitor_count, competitors) = extract::extract_competitors(raw);

                sqlx::query(
                    r#"
                    INSERT INTO businesses
                        (campaign_id, organization_id, place_id, name, address, city, state,
                         zip_code, phone, website, category, categories, rating, reviews_count,
                         opening_hours, facebook_url, instagram_url, linkedin_url,
                         email, email_source,
                         is_women_owned, is_small_business, is_veteran_owned, is_minority_owned,
                         accepts_credit_cards, accepts_nfc_payments, is_wheelchair_accessible,
                         appointment_required, has_online_booking, booking_url,
                         five_star_percent, review_sentiment_tags, competitors, competitor_count,
                         raw)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                            $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27,
                            $28, $29, $30, $31, $32, $33, $34, $35)
                    ON CONFLICT (campaign_id, place_id) DO UPDATE SET
                        name = EXCLUDED.name,
                        address = EXCLUDED.address,
                        city = EXCLUDED.city,
                        state = EXCLUDED.state,
                        zip_code = EXCLUDED.zip_code,
                        phone = EXCLUDED.phone,
                        website = EXCLUDED.website,
                        category = EXCLUDED.category,
                        categories = EXCLUDED.categories,
                        rating = EXCLUDED.rating,
                        reviews_count = EXCLUDED.reviews_count,
                        opening_hours = EXCLUDED.opening_hours,
                        facebook_url = COALESCE(businesses.facebook_url, EXCLUDED.facebook_url),
                        instagram_url = COALESCE(businesses.instagram_url, EXCLUDED.instagram_url),
                        linkedin_url = COALESCE(businesses.linkedin_url, EXCLUDED.linkedin_url),
                        email = COALESCE(businesses.email, EXCLUDED.email),
                        email_source = CASE
                            WHEN businesses.email IS NULL AND EXCLUDED.email IS NOT NULL
                                THEN 'google_maps'
                            ELSE businesses.email_source
                        END,
                        raw = EXCLUDED.raw,
                        updated_at = now()
                    "#,
                )
                .bind(campaign_id)
                .bind(organization_id)
                .bind(place_id)
                .bind(name)
                .bind(str_field("address"))
                .bind(str_field("city"))
                .bind(str_field("state"))
                .bind(zip_code)
                .bind(str_field("phone"))
                .bind(str_field("website"))
                .bind(str_field("categoryName"))
                .bind(&categories)
                .bind(raw.get("totalScore").and_then(|v| v.as_f64()))
                .bind(raw.get("reviewsCount").and_then(|v| v.as_i64()))
                .bind(raw.get("openingHours").cloned())
                .bind(extract::extract_facebook_url(raw))
                .bind(extract::extract_instagram_url(raw))
                .bind(extract::extract_linkedin_url(raw))
                .bind(&direct_email)
                .bind(if direct_email.is_some() {
                    EmailSource::GoogleMaps.as_str()
                } else {
                    EmailSource::NotFound.as_str()
                })
                .bind(attrs.is_women_owned)
                .bind(attrs.is_small_business)
                .bind(attrs.is_veteran_owned)
                .bind(attrs.is_minority_owned)
                .bind(attrs.accepts_credit_cards)
                .bind(attrs.accepts_nfc_payments)
                .bind(attrs.is_wheelchair_accessible)
                .bind(attrs.appointment_required)
                .bind(has_booking)
                .bind(booking_url)
                .bind(five_star_percent)
                .bind(&sentiment_tags)
                .bind(competitors)
                .bind(competitor_count)
                .bind(raw)
                .execute(&mut *tx)
                .await?;

                processed += 1;
            }
            tx.commit().await?;
        }

        Ok(processed)
    }

    /// Durable business count for one output ZIP; the authoritative number,
    /// never the upsert's return value.
    pub async fn count_by_zip(&self, campaign_id: Uuid, zip_code: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM businesses WHERE campaign_id = $1 AND zip_code = $2",
        )
        .bind(campaign_id)
        .bind(zip_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Phase-1 direct emails that have not been verified yet.
    pub async fn get_unverified_direct_emails(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<(Uuid, String)>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT id, email FROM businesses
            WHERE campaign_id = $1
              AND email IS NOT NULL
              AND email_source = 'google_maps'
              AND email_verified IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Direct-email count for one output ZIP, for the coverage cell record.
    pub async fn count_direct_emails_by_zip(
        &self,
        campaign_id: Uuid,
        zip_code: &str,
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM businesses
            WHERE campaign_id = $1 AND zip_code = $2
              AND email IS NOT NULL AND email_source = 'google_maps'
            "#,
        )
        .bind(campaign_id)
        .bind(zip_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Total businesses discovered for a campaign.
    pub async fn count_businesses(&self, campaign_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM businesses WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// How many businesses carry a Facebook page URL.
    pub async fn count_facebook_pages(&self, campaign_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM businesses WHERE campaign_id = $1 AND facebook_url IS NOT NULL",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Businesses with a Facebook page that haven't been socially enriched.
    pub async fn get_businesses_for_social_enrichment(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<BusinessRow>> {
        let rows = sqlx::query_as::<_, BusinessRow>(
            r#"
            SELECT * FROM businesses
            WHERE campaign_id = $1
              AND facebook_url IS NOT NULL
              AND needs_enrichment
              AND enrichment_status = 'pending'
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Businesses not yet professionally enriched. Enrichment-row presence
    /// means "already tried", so reruns skip them.
    pub async fn get_businesses_for_professional_enrichment(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<BusinessRow>> {
        let rows = sqlx::query_as::<_, BusinessRow>(
            r#"
            SELECT * FROM businesses b
            WHERE b.campaign_id = $1
              AND NOT b.professional_enriched
              AND NOT EXISTS (
                  SELECT 1 FROM linkedin_enrichments l WHERE l.business_id = b.id
              )
            ORDER BY b.created_at
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Businesses holding an email, for copy generation. Rows that already
    /// have an icebreaker are excluded so reruns are no-ops.
    pub async fn get_businesses_needing_copy(&self, campaign_id: Uuid) -> Result<Vec<BusinessRow>> {
        let rows = sqlx::query_as::<_, BusinessRow>(
            r#"
            SELECT * FROM businesses
            WHERE campaign_id = $1 AND email IS NOT NULL AND icebreaker IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Authoritative email count: businesses with a direct email, plus any
    /// whose enrichments found a primary email. Phase totals come from here,
    /// never from in-memory counters.
    pub async fn count_businesses_with_email(&self, campaign_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM businesses b
            WHERE b.campaign_id = $1
              AND (b.email IS NOT NULL
                OR EXISTS (
                    SELECT 1 FROM facebook_enrichments f
                    WHERE f.business_id = b.id AND f.primary_email IS NOT NULL)
                OR EXISTS (
                    SELECT 1 FROM linkedin_enrichments l
                    WHERE l.business_id = b.id AND l.primary_email IS NOT NULL))
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Count of businesses whose promoted email came from one source.
    pub async fn count_emails_by_source(
        &self,
        campaign_id: Uuid,
        source: EmailSource,
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM businesses
            WHERE campaign_id = $1 AND email IS NOT NULL AND email_source = $2
            "#,
        )
        .bind(campaign_id)
        .bind(source.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Verification outcome for a Phase-1 direct email, denormalized onto
    /// the business row.
    pub async fn update_business_verification(
        &self,
        business_id: Uuid,
        record: &VerificationRecord,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE businesses
            SET email_verified = $2, email_verification_score = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(business_id)
        .bind(record.is_safe)
        .bind(record.score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_copy(&self, business_id: Uuid, copy: &GeneratedCopy) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE businesses
            SET icebreaker = $2,
                subject_line = $3,
                copy_template = $4,
                copy_formula = $5,
                copy_variant = $6,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(business_id)
        .bind(&copy.icebreaker)
        .bind(&copy.subject_line)
        .bind(&copy.template_used)
        .bind(&copy.formula_used)
        .bind(copy.variant)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Social enrichment ---

    /// Insert one Facebook enrichment attempt (even a failed one) and update
    /// the business: enrichment state always, email only when the business
    /// doesn't have one yet.
    pub async fn save_social_enrichment(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
        enrichment: &SocialEnrichment,
    ) -> Result<Uuid> {
        let row = sqlx::query_as::<_, EnrichmentId>(
            r#"
            INSERT INTO facebook_enrichments
                (business_id, campaign_id, facebook_url, page_name, page_likes,
                 page_followers, emails, primary_email, phone_numbers, addresses,
                 success, raw)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(business_id)
        .bind(campaign_id)
        .bind(&enrichment.facebook_url)
        .bind(&enrichment.page_name)
        .bind(enrichment.page_likes)
        .bind(enrichment.page_followers)
        .bind(&enrichment.emails)
        .bind(&enrichment.primary_email)
        .bind(&enrichment.phone_numbers)
        .bind(&enrichment.addresses)
        .bind(enrichment.success)
        .bind(&enrichment.raw)
        .fetch_one(&self.pool)
        .await?;

        let status = if enrichment.success { "enriched" } else { "failed" };
        sqlx::query(
            r#"
            UPDATE businesses
            SET needs_enrichment = FALSE,
                enrichment_status = $2,
                email = CASE WHEN email IS NULL THEN $3 ELSE email END,
                email_source = CASE
                    WHEN email IS NULL AND $3 IS NOT NULL THEN 'facebook'
                    ELSE email_source
                END,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(business_id)
        .bind(status)
        .bind(&enrichment.primary_email)
        .execute(&self.pool)
        .await?;

        Ok(row.id)
    }

    pub async fn update_social_verification(
        &self,
        enrichment_id: Uuid,
        record: &VerificationRecord,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE facebook_enrichments
            SET verification_status = $2,
                verification_score = $3,
                is_disposable = $4,
                is_role_based = $5,
                is_free = $6,
                is_gibberish = $7,
                verification_raw = $8
            WHERE id = $1
            "#,
        )
        .bind(enrichment_id)
        .bind(record.status.as_str())
        .bind(record.score)
        .bind(record.is_disposable)
        .bind(record.is_role_based)
        .bind(record.is_free)
        .bind(record.is_gibberish)
        .bind(&record.raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Professional enrichment ---

    /// Insert one LinkedIn enrichment attempt and update the business.
    /// Email promotion is rank-based: a verified profile email displaces a
    /// pattern one even within the same provider.
    pub async fn save_professional_enrichment(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
        enrichment: &ProfessionalEnrichment,
    ) -> Result<Uuid> {
        let row = sqlx::query_as::<_, EnrichmentId>(
            r#"
            INSERT INTO linkedin_enrichments
                (business_id, campaign_id, linkedin_url, profile_type, profile_found,
                 person_name, person_title, emails_found, emails_generated,
                 primary_email, email_quality_tier, phone, raw)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(business_id)
        .bind(campaign_id)
        .bind(&enrichment.linkedin_url)
        .bind(&enrichment.profile_type)
        .bind(enrichment.profile_found)
        .bind(&enrichment.person_name)
        .bind(&enrichment.person_title)
        .bind(&enrichment.emails_found)
        .bind(&enrichment.emails_generated)
        .bind(&enrichment.primary_email)
        .bind(enrichment.email_quality_tier.as_i16())
        .bind(&enrichment.phone)
        .bind(&enrichment.raw)
        .fetch_one(&self.pool)
        .await?;

        // Parsed contact name from a personal profile URL, when available.
        let contact_name = enrichment
            .linkedin_url
            .as_deref()
            .and_then(extract::contact_name_from_profile_url);
        let (first_name, last_name) = match contact_name {
            Some((first, last)) => (Some(first), last),
            None => (None, None),
        };

        sqlx::query(
            r#"
            UPDATE businesses
            SET professional_enriched = TRUE,
                linkedin_url = COALESCE($2, linkedin_url),
                contact_first_name = COALESCE($3, contact_first_name),
                contact_last_name = COALESCE($4, contact_last_name),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(business_id)
        .bind(&enrichment.linkedin_url)
        .bind(first_name)
        .bind(last_name)
        .execute(&self.pool)
        .await?;

        if let Some(ref email) = enrichment.primary_email {
            self.promote_professional_email(business_id, email, enrichment.email_quality_tier)
                .await?;
        }

        Ok(row.id)
    }

    /// Promote a LinkedIn email onto the business if it outranks whatever is
    /// already there.
    async fn promote_professional_email(
        &self,
        business_id: Uuid,
        email: &str,
        tier: EmailQualityTier,
    ) -> Result<()> {
        let current = sqlx::query_as::<_, (Option<String>, String, Option<i16>)>(
            "SELECT email, email_source, email_quality_tier FROM businesses WHERE id = $1",
        )
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((current_email, current_source, current_tier)) = current else {
            return Ok(());
        };

        let current_rank = if current_email.is_none() {
            0
        } else {
            let source = match current_source.as_str() {
                "google_maps" => EmailSource::GoogleMaps,
                "facebook" => EmailSource::Facebook,
                "linkedin" => EmailSource::Linkedin,
                _ => EmailSource::NotFound,
            };
            email_source_rank(source, current_tier.and_then(EmailQualityTier::from_i16))
        };
        let candidate_rank = email_source_rank(EmailSource::Linkedin, Some(tier));

        if candidate_rank <= current_rank {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE businesses
            SET email = $2,
                email_source = 'linkedin',
                email_quality_tier = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(business_id)
        .bind(email)
        .bind(tier.as_i16())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_professional_verification(
        &self,
        enrichment_id: Uuid,
        record: &VerificationRecord,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE linkedin_enrichments
            SET verification_status = $2,
                verification_score = $3,
                is_disposable = $4,
                is_role_based = $5,
                is_free = $6,
                is_gibberish = $7,
                verification_raw = $8
            WHERE id = $1
            "#,
        )
        .bind(enrichment_id)
        .bind(record.status.as_str())
        .bind(record.score)
        .bind(record.is_disposable)
        .bind(record.is_role_based)
        .bind(record.is_free)
        .bind(record.is_gibberish)
        .bind(&record.raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- Verification log ---

    /// Append one verification attempt to the log.
    pub async fn record_verification(
        &self,
        campaign_id: Uuid,
        business_id: Option<Uuid>,
        enrichment_id: Option<Uuid>,
        source: EmailSource,
        record: &VerificationRecord,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO email_verifications
                (campaign_id, business_id, enrichment_id, source, email, status, score,
                 is_safe, is_disposable, is_role_based, is_free, is_gibberish, raw)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(campaign_id)
        .bind(business_id)
        .bind(enrichment_id)
        .bind(source.as_str())
        .bind(&record.email)
        .bind(record.status.as_str())
        .bind(record.score)
        .bind(record.is_safe)
        .bind(record.is_disposable)
        .bind(record.is_role_based)
        .bind(record.is_free)
        .bind(record.is_gibberish)
        .bind(&record.raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- API costs ---

    /// Log one external spend and fold it into the matching campaign
    /// accumulator in the same statement batch.
    pub async fn track_api_cost(
        &self,
        campaign_id: Uuid,
        service: Service,
        items: i32,
        cost_usd: f64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO api_costs (campaign_id, service, items, cost_usd) VALUES ($1, $2, $3, $4)",
        )
        .bind(campaign_id)
        .bind(service.as_str())
        .bind(items)
        .bind(cost_usd)
        .execute(&mut *tx)
        .await?;

        let column = match service {
            Service::MapScraping => "map_cost",
            Service::Facebook => "facebook_cost",
            Service::Linkedin => "linkedin_cost",
            Service::EmailVerification => "verifier_cost",
        };
        let statement = format!(
            "UPDATE campaigns SET {column} = {column} + $2, updated_at = now() WHERE id = $1"
        );
        sqlx::query(&statement)
            .bind(campaign_id)
            .bind(cost_usd)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Log LLM spend against the campaign.
    pub async fn track_llm_cost(&self, campaign_id: Uuid, items: i32, cost_usd: f64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO api_costs (campaign_id, service, items, cost_usd) VALUES ($1, 'openai', $2, $3)",
        )
        .bind(campaign_id)
        .bind(items)
        .bind(cost_usd)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE campaigns SET llm_cost = llm_cost + $2, updated_at = now() WHERE id = $1",
        )
        .bind(campaign_id)
        .bind(cost_usd)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    // --- Master leads ---

    /// Refresh the cross-campaign deduplicated leads view. Called once at
    /// campaign end; concurrent refresh keeps readers unblocked.
    pub async fn refresh_master_leads(&self) -> Result<()> {
        sqlx::query("REFRESH MATERIALIZED VIEW CONCURRENTLY master_leads")
            .execute(&self.pool)
            .await?;
        info!("master_leads refreshed");
        Ok(())
    }
}
