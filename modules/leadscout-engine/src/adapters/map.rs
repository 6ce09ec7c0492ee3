//! Map-discovery adapter: batched "{keyword} {zip}" searches against the
//! places actor, with results re-attributed to the ZIP in each business's
//! own address.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info};

use apify_client::ApifyClient;
use leadscout_store::extract;

use crate::govern::{RateGovernor, ServiceKind};

pub struct MapScraper {
    apify: Arc<ApifyClient>,
    governor: Arc<RateGovernor>,
}

impl MapScraper {
    pub fn new(apify: Arc<ApifyClient>, governor: Arc<RateGovernor>) -> Self {
        Self { apify, governor }
    }

    /// One actor run for a batch of search strings (multiple ZIPs ride in
    /// one run). Returns raw business payloads.
    pub async fn scrape(&self, queries: &[String], max_per_query: u32) -> Result<Vec<Value>> {
        self.governor.wait_for_service(ServiceKind::Apify).await;
        let items = self.apify.scrape_places(queries, max_per_query).await?;
        info!(queries = queries.len(), businesses = items.len(), "Map scrape returned");
        Ok(items.into_iter().map(|(_, raw)| raw).collect())
    }
}

/// Partition raw businesses by the ZIP extracted from their own address
/// (never the input ZIP, which the actor may spill past), deduplicating by
/// place id within each output ZIP. Items without a resolvable ZIP or
/// place id are dropped.
pub fn partition_by_zip(raw_items: Vec<Value>) -> HashMap<String, Vec<Value>> {
    let mut by_zip: HashMap<String, Vec<Value>> = HashMap::new();
    let mut seen: HashMap<String, HashSet<String>> = HashMap::new();

    for raw in raw_items {
        let Some(place_id) = raw.get("placeId").and_then(|v| v.as_str()).map(String::from) else {
            debug!("Dropping business without placeId");
            continue;
        };
        let Some(zip) = extract::extract_zip(&raw) else {
            debug!(place_id, "Dropping business without a resolvable ZIP");
            continue;
        };

        let seen_for_zip = seen.entry(zip.clone()).or_default();
        if !seen_for_zip.insert(place_id) {
            continue;
        }
        by_zip.entry(zip).or_default().push(raw);
    }

    by_zip
}

/// Build the search strings for one keyword across a batch of ZIPs.
pub fn build_queries(keyword: &str, zips: &[String]) -> Vec<String> {
    zips.iter().map(|zip| format!("{keyword} {zip}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partition_uses_address_zip_not_input() {
        let items = vec![
            json!({"placeId": "a", "postalCode": "78701", "address": "1 Main St, Austin, TX 78701"}),
            json!({"placeId": "b", "address": "9 Spill Rd, Round Rock, TX 78664"}),
            json!({"placeId": "c", "address": "no zip here"}),
            json!({"address": "2 Main St, Austin, TX 78701"}),
        ];
        let by_zip = partition_by_zip(items);
        assert_eq!(by_zip.len(), 2);
        assert_eq!(by_zip["78701"].len(), 1);
        assert_eq!(by_zip["78664"].len(), 1);
    }

    #[test]
    fn partition_dedupes_place_ids_within_zip() {
        let items = vec![
            json!({"placeId": "a", "postalCode": "78701"}),
            json!({"placeId": "a", "postalCode": "78701"}),
            json!({"placeId": "a", "postalCode": "78702"}),
        ];
        let by_zip = partition_by_zip(items);
        assert_eq!(by_zip["78701"].len(), 1);
        // Same place spilling into another ZIP stays: the upsert key absorbs it.
        assert_eq!(by_zip["78702"].len(), 1);
    }

    #[test]
    fn queries_pair_keyword_with_each_zip() {
        let queries = build_queries("dentist", &["78701".into(), "78702".into()]);
        assert_eq!(queries, vec!["dentist 78701", "dentist 78702"]);
    }
}
