use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "statusMessage")]
    pub status_message: Option<String>,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

// --- Google Maps places crawler ---

/// Input for the Google Maps places crawler actor.
#[derive(Debug, Clone, Serialize)]
pub struct PlacesScraperInput {
    #[serde(rename = "searchStringsArray")]
    pub search_strings_array: Vec<String>,
    #[serde(rename = "maxCrawledPlacesPerSearch")]
    pub max_crawled_places_per_search: u32,
    pub language: String,
}

/// Geographic point on a place item.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceLocation {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Star-count histogram attached to a place item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewsDistribution {
    #[serde(rename = "oneStar", default)]
    pub one_star: i64,
    #[serde(rename = "twoStar", default)]
    pub two_star: i64,
    #[serde(rename = "threeStar", default)]
    pub three_star: i64,
    #[serde(rename = "fourStar", default)]
    pub four_star: i64,
    #[serde(rename = "fiveStar", default)]
    pub five_star: i64,
}

/// One opening-hours entry (`{"day": "Monday", "hours": "9AM–5PM"}`).
#[derive(Debug, Clone, Deserialize)]
pub struct OpeningHoursEntry {
    pub day: Option<String>,
    pub hours: Option<String>,
}

/// A single business from the places crawler dataset.
///
/// The actor's schema is loose and evolving; the canonical fields are typed
/// here and everything else (`additionalInfo`, booking links, review tags,
/// people-also-search) stays as raw JSON for the extraction helpers.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceItem {
    pub title: Option<String>,
    #[serde(rename = "placeId")]
    pub place_id: Option<String>,
    pub address: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "postalCode")]
    pub postal_code: Option<String>,
    pub location: Option<PlaceLocation>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "categoryName")]
    pub category_name: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(rename = "totalScore")]
    pub total_score: Option<f64>,
    #[serde(rename = "reviewsCount")]
    pub reviews_count: Option<i64>,
    #[serde(rename = "openingHours", default)]
    pub opening_hours: Vec<OpeningHoursEntry>,
    /// Email addresses the crawler found on the place's website, if any.
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub facebooks: Vec<String>,
    #[serde(default)]
    pub instagrams: Vec<String>,
    #[serde(rename = "linkedIns", default)]
    pub linked_ins: Vec<String>,
    #[serde(rename = "reviewsDistribution")]
    pub reviews_distribution: Option<ReviewsDistribution>,
    #[serde(rename = "additionalInfo")]
    pub additional_info: Option<Value>,
    #[serde(rename = "reviewsTags")]
    pub reviews_tags: Option<Value>,
    #[serde(rename = "peopleAlsoSearch")]
    pub people_also_search: Option<Value>,
    #[serde(rename = "bookingLinks")]
    pub booking_links: Option<Value>,
    #[serde(rename = "reserveTableUrl")]
    pub reserve_table_url: Option<String>,
    #[serde(rename = "tableReservationLinks")]
    pub table_reservation_links: Option<Value>,
}

// --- Facebook pages scraper ---

/// A start URL entry for actors that take `startUrls`.
#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

/// Input for the Facebook pages scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct FacebookPagesInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<StartUrl>,
}

/// A single Facebook page from the Apify dataset. The actor returns the
/// page email at root level; `about`/`info`/`contactInfo` sections carry
/// additional contact data in free-form JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct FacebookPageItem {
    pub url: Option<String>,
    #[serde(rename = "facebookUrl")]
    pub facebook_url: Option<String>,
    #[serde(rename = "pageUrl")]
    pub page_url: Option<String>,
    #[serde(rename = "pageName")]
    pub page_name: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub likes: Option<i64>,
    pub followers: Option<i64>,
    pub about: Option<Value>,
    pub info: Option<Value>,
    #[serde(rename = "contactInfo")]
    pub contact_info: Option<Value>,
    #[serde(default)]
    pub services: Vec<Value>,
}

impl FacebookPageItem {
    /// The page URL, whichever field the actor populated.
    pub fn any_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.facebook_url.as_deref())
            .or(self.page_url.as_deref())
    }

    /// The page name, whichever field the actor populated.
    pub fn any_name(&self) -> Option<&str> {
        self.page_name
            .as_deref()
            .or(self.name.as_deref())
            .or(self.title.as_deref())
    }
}

// --- Google search scraper ---

/// Input for the Google search scraper. Queries are newline-joined into a
/// single `queries` string; the actor emits one result page per query.
#[derive(Debug, Clone, Serialize)]
pub struct GoogleSearchInput {
    pub queries: String,
    #[serde(rename = "resultsPerPage")]
    pub results_per_page: u32,
    #[serde(rename = "maxPagesPerQuery")]
    pub max_pages_per_query: u32,
}

/// The query echo on a search result page.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQueryEcho {
    pub term: Option<String>,
}

/// One organic search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganicResult {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
}

/// One results page from the Google search scraper dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSearchPage {
    #[serde(rename = "searchQuery")]
    pub search_query: Option<SearchQueryEcho>,
    #[serde(rename = "organicResults", default)]
    pub organic_results: Vec<OrganicResult>,
}

// --- LinkedIn profile/company scraper ---

/// Input for the LinkedIn scraper actor. `action` selects profile vs
/// company mode; URLs go through `keywords` with `isUrl` set.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedInScraperInput {
    pub action: String,
    pub keywords: Vec<String>,
    #[serde(rename = "isUrl")]
    pub is_url: bool,
    #[serde(rename = "isName")]
    pub is_name: bool,
    pub limit: u32,
}

/// A scraped LinkedIn profile or company page. Personal profiles populate
/// `first_name`/`last_name`/`headline`; companies populate `name`/`industry`.
/// Serializes back out for enrichment-row persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInItem {
    pub url: Option<String>,
    #[serde(rename = "publicIdentifier")]
    pub public_identifier: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub headline: Option<String>,
    pub industry: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "personalEmail")]
    pub personal_email: Option<String>,
    #[serde(rename = "workEmail")]
    pub work_email: Option<String>,
    #[serde(rename = "contactEmail")]
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub connections: Option<i64>,
    #[serde(rename = "followerCount")]
    pub follower_count: Option<i64>,
}

impl LinkedInItem {
    /// The profile URL, preferring the canonical `url` field.
    pub fn any_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.public_identifier.as_deref())
    }

    /// All distinct emails present on the item, in field order.
    pub fn emails(&self) -> Vec<String> {
        let mut out = Vec::new();
        for field in [
            &self.email,
            &self.personal_email,
            &self.work_email,
            &self.contact_email,
        ] {
            if let Some(e) = field {
                if !e.is_empty() && !out.contains(e) {
                    out.push(e.clone());
                }
            }
        }
        out
    }
}

// --- Profile email extractor ---

/// Input for the public-email extractor actor.
#[derive(Debug, Clone, Serialize)]
pub struct EmailExtractorInput {
    #[serde(rename = "profileUrls")]
    pub profile_urls: Vec<String>,
    #[serde(rename = "proxyConfiguration")]
    pub proxy_configuration: ProxyConfiguration,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfiguration {
    #[serde(rename = "useApifyProxy")]
    pub use_apify_proxy: bool,
}

/// One extraction result: the public email and mobile number a profile
/// exposes, if any. Hit rate is low but the data is verified-quality.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileEmailItem {
    #[serde(rename = "linkedinUrl")]
    pub linkedin_url: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "mobileNumber")]
    pub mobile_number: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
}

impl ProfileEmailItem {
    pub fn any_url(&self) -> Option<&str> {
        self.linkedin_url.as_deref().or(self.url.as_deref())
    }

    pub fn any_phone(&self) -> Option<&str> {
        self.mobile_number.as_deref().or(self.phone.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_item_parses_loose_payload() {
        let raw = serde_json::json!({
            "title": "Sunset Dental",
            "placeId": "ChIJabc123",
            "address": "123 Main St, Austin, TX 78701",
            "postalCode": "78701",
            "location": {"lat": 30.26, "lng": -97.74},
            "categoryName": "Dentist",
            "categories": ["Dentist", "Cosmetic dentist"],
            "totalScore": 4.7,
            "reviewsCount": 212,
            "facebooks": ["https://facebook.com/sunsetdental"],
            "reviewsDistribution": {"oneStar": 2, "fiveStar": 180},
            "additionalInfo": {"From the business": [{"Identifies as women-owned": true}]},
            "someFutureField": {"nested": true}
        });
        let item: PlaceItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.place_id.as_deref(), Some("ChIJabc123"));
        assert_eq!(item.categories.len(), 2);
        assert_eq!(item.reviews_distribution.unwrap().five_star, 180);
        assert!(item.additional_info.is_some());
        assert!(item.emails.is_empty());
    }

    #[test]
    fn facebook_page_prefers_root_fields() {
        let raw = serde_json::json!({
            "pageUrl": "https://www.facebook.com/sunsetdental",
            "pageName": "Sunset Dental",
            "email": "info@sunsetdental.com",
            "likes": 431
        });
        let page: FacebookPageItem = serde_json::from_value(raw).unwrap();
        assert_eq!(page.any_url(), Some("https://www.facebook.com/sunsetdental"));
        assert_eq!(page.any_name(), Some("Sunset Dental"));
        assert_eq!(page.email.as_deref(), Some("info@sunsetdental.com"));
    }

    #[test]
    fn linkedin_item_collects_distinct_emails() {
        let raw = serde_json::json!({
            "url": "https://linkedin.com/in/jane-doe",
            "firstName": "Jane",
            "lastName": "Doe",
            "email": "jane@acme.com",
            "workEmail": "jane@acme.com",
            "personalEmail": "jane.doe@gmail.com"
        });
        let item: LinkedInItem = serde_json::from_value(raw).unwrap();
        assert_eq!(
            item.emails(),
            vec!["jane@acme.com".to_string(), "jane.doe@gmail.com".to_string()]
        );
    }

    #[test]
    fn search_page_defaults_empty_organics() {
        let raw = serde_json::json!({"searchQuery": {"term": "\"Sunset Dental\" site:linkedin.com Austin"}});
        let page: GoogleSearchPage = serde_json::from_value(raw).unwrap();
        assert!(page.organic_results.is_empty());
        assert_eq!(
            page.search_query.unwrap().term.as_deref(),
            Some("\"Sunset Dental\" site:linkedin.com Austin")
        );
    }
}
