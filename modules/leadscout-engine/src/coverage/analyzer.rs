//! Location analysis: classify the target, ask the LLM for candidate ZIPs
//! (state searches fan out city-by-city), then apply spatial de-overlap.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use ai_client::OpenAi;
use leadscout_common::pricing::{estimate_campaign_cost, CostEstimate};
use leadscout_common::CoverageProfile;

use crate::govern::{RateGovernor, ServiceKind};

use super::catalog::ZipCatalog;
use super::spatial::{select_with_relaxation, spacing_for_density, ScoredZip};

/// Bounded concurrency for per-city candidate calls in state mode.
const STATE_FANOUT_CONCURRENCY: usize = 10;

/// Wall-clock budget for the whole state fan-out.
const STATE_FANOUT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Expected business count for a direct single-ZIP search.
const SINGLE_ZIP_ESTIMATE: i32 = 250;

const LLM_ATTEMPTS: u32 = 3;

/// What kind of place the location string names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    Zip,
    City,
    State,
}

/// One ZIP chosen for the campaign.
#[derive(Debug, Clone)]
pub struct SelectedZip {
    pub zip: String,
    pub estimated_businesses: i32,
    pub score: f64,
}

/// The analyzer's output: chosen ZIPs plus cost estimate. `manual_mode`
/// means candidate generation failed and the campaign must not start.
#[derive(Debug, Clone)]
pub struct CoverageAnalysis {
    pub location: String,
    pub kind: LocationKind,
    pub selected: Vec<SelectedZip>,
    pub spacing_miles: f64,
    pub manual_mode: bool,
    pub total_estimated_businesses: i64,
    pub cost: CostEstimate,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl CoverageAnalysis {
    fn manual(location: &str, kind: LocationKind) -> Self {
        Self {
            location: location.to_string(),
            kind,
            selected: Vec::new(),
            spacing_miles: 0.0,
            manual_mode: true,
            total_estimated_businesses: 0,
            cost: CostEstimate::default(),
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CandidateRow {
    zip_code: String,
    #[serde(default)]
    density_score: f64,
    #[serde(default)]
    relevance_score: f64,
    #[serde(default)]
    estimated_businesses: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct CandidateResponse {
    #[serde(default)]
    zip_codes: Vec<CandidateRow>,
}

#[derive(Debug, Deserialize)]
struct CityRow {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CitiesResponse {
    #[serde(default)]
    cities: Vec<CityRow>,
}

const US_STATES: [(&str, &str); 50] = [
    ("alabama", "al"), ("alaska", "ak"), ("arizona", "az"), ("arkansas", "ar"),
    ("california", "ca"), ("colorado", "co"), ("connecticut", "ct"), ("delaware", "de"),
    ("florida", "fl"), ("georgia", "ga"), ("hawaii", "hi"), ("idaho", "id"),
    ("illinois", "il"), ("indiana", "in"), ("iowa", "ia"), ("kansas", "ks"),
    ("kentucky", "ky"), ("louisiana", "la"), ("maine", "me"), ("maryland", "md"),
    ("massachusetts", "ma"), ("michigan", "mi"), ("minnesota", "mn"), ("mississippi", "ms"),
    ("missouri", "mo"), ("montana", "mt"), ("nebraska", "ne"), ("nevada", "nv"),
    ("new hampshire", "nh"), ("new jersey", "nj"), ("new mexico", "nm"), ("new york", "ny"),
    ("north carolina", "nc"), ("north dakota", "nd"), ("ohio", "oh"), ("oklahoma", "ok"),
    ("oregon", "or"), ("pennsylvania", "pa"), ("rhode island", "ri"), ("south carolina", "sc"),
    ("south dakota", "sd"), ("tennessee", "tn"), ("texas", "tx"), ("utah", "ut"),
    ("vermont", "vt"), ("virginia", "va"), ("washington", "wa"), ("west virginia", "wv"),
    ("wisconsin", "wi"), ("wyoming", "wy"),
];

/// Classify the location string. A bare state name or 2-letter code is a
/// state search; a string with a city component ("Austin, TX") is not.
pub fn classify_location(location: &str) -> LocationKind {
    let trimmed = location.trim();
    if trimmed.len() == 5 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return LocationKind::Zip;
    }

    let lowered = trimmed.to_lowercase();
    if US_STATES
        .iter()
        .any(|(name, code)| lowered == *name || lowered == *code)
    {
        return LocationKind::State;
    }

    LocationKind::City
}

/// How many cities a state search fans out to, by profile.
fn state_city_budget(profile: CoverageProfile) -> usize {
    match profile {
        CoverageProfile::Budget => 5,
        CoverageProfile::Balanced => 15,
        CoverageProfile::Aggressive => 50,
        CoverageProfile::Custom => 15,
    }
}

pub struct CoverageAnalyzer {
    llm: OpenAi,
    catalog: Arc<ZipCatalog>,
    governor: Arc<RateGovernor>,
}

impl CoverageAnalyzer {
    pub fn new(llm: OpenAi, catalog: Arc<ZipCatalog>, governor: Arc<RateGovernor>) -> Self {
        Self {
            llm,
            catalog,
            governor,
        }
    }

    /// Analyze a location and pick the campaign's ZIPs. Failures collapse
    /// into `manual_mode` rather than erroring; the executor refuses to
    /// start Phase 1 on a manual-mode analysis.
    pub async fn analyze(
        &self,
        location: &str,
        keywords: &[String],
        profile: CoverageProfile,
    ) -> CoverageAnalysis {
        let kind = classify_location(location);
        info!(location, ?kind, profile = profile.as_str(), "Analyzing coverage");

        if kind == LocationKind::Zip {
            return self.single_zip(location);
        }

        let mut prompt_tokens = 0u64;
        let mut completion_tokens = 0u64;

        let candidates = match kind {
            LocationKind::City => {
                match self.city_candidates(location, keywords, profile).await {
                    Ok((rows, usage)) => {
                        prompt_tokens += usage.0;
                        completion_tokens += usage.1;
                        rows
                    }
                    Err(e) => {
                        warn!(location, error = %e, "Candidate generation failed");
                        return CoverageAnalysis::manual(location, kind);
                    }
                }
            }
            LocationKind::State => {
                match self
                    .state_candidates(location, keywords, profile, &mut prompt_tokens, &mut completion_tokens)
                    .await
                {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(location, error = %e, "State analysis failed");
                        return CoverageAnalysis::manual(location, kind);
                    }
                }
            }
            LocationKind::Zip => unreachable!(),
        };

        if candidates.is_empty() {
            warn!(location, "No candidate ZIPs returned");
            let mut analysis = CoverageAnalysis::manual(location, kind);
            analysis.prompt_tokens = prompt_tokens;
            analysis.completion_tokens = completion_tokens;
            return analysis;
        }

        let scored = self.score_candidates(candidates);
        let params = profile.params();

        // Spacing from the average density of the strongest candidates the
        // gazetteer knows, else the profile default.
        let top_densities: Vec<f64> = scored
            .iter()
            .take(10)
            .filter_map(|z| z.population_density)
            .collect();
        let spacing = if top_densities.is_empty() {
            params.default_spacing_miles
        } else {
            let avg = top_densities.iter().sum::<f64>() / top_densities.len() as f64;
            spacing_for_density(avg)
        };

        let selected = select_with_relaxation(&scored, spacing, params.min_zips, params.max_zips);
        let total_estimated: i64 = selected
            .iter()
            .map(|z| z.estimated_businesses as i64)
            .sum();

        info!(
            location,
            candidates = scored.len(),
            selected = selected.len(),
            spacing_miles = spacing,
            total_estimated,
            "Coverage selection complete"
        );

        CoverageAnalysis {
            location: location.to_string(),
            kind,
            selected: selected
                .into_iter()
                .map(|z| SelectedZip {
                    zip: z.zip,
                    estimated_businesses: z.estimated_businesses,
                    score: z.combined_score,
                })
                .collect(),
            spacing_miles: spacing,
            manual_mode: false,
            total_estimated_businesses: total_estimated,
            cost: estimate_campaign_cost(total_estimated.max(0) as u64),
            prompt_tokens,
            completion_tokens,
        }
    }

    fn single_zip(&self, zip: &str) -> CoverageAnalysis {
        CoverageAnalysis {
            location: zip.to_string(),
            kind: LocationKind::Zip,
            selected: vec![SelectedZip {
                zip: zip.trim().to_string(),
                estimated_businesses: SINGLE_ZIP_ESTIMATE,
                score: 10.0,
            }],
            spacing_miles: 0.0,
            manual_mode: false,
            total_estimated_businesses: SINGLE_ZIP_ESTIMATE as i64,
            cost: estimate_campaign_cost(SINGLE_ZIP_ESTIMATE as u64),
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }

    fn score_candidates(&self, rows: Vec<CandidateRow>) -> Vec<ScoredZip> {
        let mut scored: Vec<ScoredZip> = rows
            .into_iter()
            .filter(|r| r.zip_code.len() == 5 && r.zip_code.chars().all(|c| c.is_ascii_digit()))
            .map(|r| {
                let info = self.catalog.get(&r.zip_code);
                ScoredZip {
                    combined_score: 0.6 * r.density_score + 0.4 * r.relevance_score,
                    density_score: r.density_score,
                    relevance_score: r.relevance_score,
                    estimated_businesses: r.estimated_businesses.unwrap_or(50),
                    lat: info.map(|i| i.lat),
                    lng: info.map(|i| i.lng),
                    population_density: info.map(|i| i.density),
                    zip: r.zip_code,
                }
            })
            .collect();
        scored.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored
    }

    /// One candidate call for a city/neighbourhood.
    async fn city_candidates(
        &self,
        location: &str,
        keywords: &[String],
        profile: CoverageProfile,
    ) -> Result<(Vec<CandidateRow>, (u64, u64))> {
        let params = profile.params();
        let max_hint = params
            .max_zips
            .map(|m| m.to_string())
            .unwrap_or_else(|| "as many as needed".to_string());

        let prompt = format!(
            r#"You are a geographic data analyst specializing in business density analysis.

Identify the ZIP codes where these businesses concentrate:

Location: {location}
Business keywords: {keywords}
Coverage profile: {profile} (up to {max_hint} ZIP codes)

Consider business density, relevance of each area to the keywords, and
geographic spread. Return JSON:
{{"zip_codes": [{{"zip_code": "90210", "density_score": 8.5, "relevance_score": 7.0, "estimated_businesses": 120}}]}}

Scores are 0-10. Only include real, 5-digit US ZIP codes."#,
            location = location,
            keywords = keywords.join(", "),
            profile = profile.as_str(),
        );

        let completion = self
            .chat_with_retry("You are a precise geographic data analyst. Always return valid JSON.", &prompt)
            .await?;

        let parsed: CandidateResponse = serde_json::from_str(&completion.content)?;
        Ok((
            parsed.zip_codes,
            (completion.usage.prompt_tokens, completion.usage.completion_tokens),
        ))
    }

    /// State mode: enumerate cities, then fan out per-city candidate calls
    /// with bounded concurrency under one aggregate timeout.
    async fn state_candidates(
        &self,
        state: &str,
        keywords: &[String],
        profile: CoverageProfile,
        prompt_tokens: &mut u64,
        completion_tokens: &mut u64,
    ) -> Result<Vec<CandidateRow>> {
        let city_budget = state_city_budget(profile);
        let prompt = format!(
            r#"List the {city_budget} most commercially significant cities in {state} for a
business-search campaign, largest markets first. Include a spread of major,
medium, and smaller cities. Return JSON:
{{"cities": [{{"name": "Houston"}}]}}"#,
        );

        let completion = self
            .chat_with_retry("You are a precise geographic data analyst. Always return valid JSON.", &prompt)
            .await?;
        *prompt_tokens += completion.usage.prompt_tokens;
        *completion_tokens += completion.usage.completion_tokens;

        let parsed: CitiesResponse = serde_json::from_str(&completion.content)?;
        let cities: Vec<String> = parsed
            .cities
            .into_iter()
            .map(|c| c.name)
            .filter(|n| !n.is_empty())
            .take(city_budget)
            .collect();
        if cities.is_empty() {
            anyhow::bail!("State analysis returned no cities");
        }
        info!(state, cities = cities.len(), "Fanning out per-city analyses");

        let semaphore = Arc::new(Semaphore::new(STATE_FANOUT_CONCURRENCY));
        let mut tasks = Vec::new();
        for city in cities {
            let semaphore = semaphore.clone();
            let location = format!("{city}, {state}");
            let keywords = keywords.to_vec();
            let analyzer = self.clone_for_task();
            tasks.push(async move {
                let _permit = semaphore.acquire().await;
                analyzer.city_candidates(&location, &keywords, profile).await
            });
        }

        let results = tokio::time::timeout(STATE_FANOUT_TIMEOUT, futures::future::join_all(tasks))
            .await
            .map_err(|_| anyhow::anyhow!("State fan-out exceeded 15 minute budget"))?;

        // Deduplicate by ZIP, keeping the highest combined score.
        let mut best: std::collections::HashMap<String, CandidateRow> =
            std::collections::HashMap::new();
        for result in results {
            match result {
                Ok((rows, usage)) => {
                    *prompt_tokens += usage.0;
                    *completion_tokens += usage.1;
                    for row in rows {
                        let score = 0.6 * row.density_score + 0.4 * row.relevance_score;
                        match best.get(&row.zip_code) {
                            Some(existing)
                                if 0.6 * existing.density_score + 0.4 * existing.relevance_score
                                    >= score => {}
                            _ => {
                                best.insert(row.zip_code.clone(), row);
                            }
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Per-city analysis failed, continuing"),
            }
        }

        Ok(best.into_values().collect())
    }

    fn clone_for_task(&self) -> Self {
        Self {
            llm: self.llm.clone(),
            catalog: self.catalog.clone(),
            governor: self.governor.clone(),
        }
    }

    async fn chat_with_retry(&self, system: &str, user: &str) -> Result<ai_client::Completion> {
        let mut attempt = 0;
        loop {
            self.governor.wait_for_service(ServiceKind::OpenAiLight).await;
            match self.llm.chat_json(system, user).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() && attempt + 1 < LLM_ATTEMPTS => {
                    let backoff = Duration::from_secs(2u64.pow(attempt));
                    warn!(error = %e, attempt = attempt + 1, "LLM call failed, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_strings_classify_as_zip() {
        assert_eq!(classify_location("90210"), LocationKind::Zip);
        assert_eq!(classify_location(" 78701 "), LocationKind::Zip);
        assert_eq!(classify_location("9021"), LocationKind::City);
    }

    #[test]
    fn bare_states_classify_as_state() {
        assert_eq!(classify_location("Texas"), LocationKind::State);
        assert_eq!(classify_location("tx"), LocationKind::State);
        assert_eq!(classify_location("New York"), LocationKind::State);
    }

    #[test]
    fn city_suffixed_with_state_is_a_city() {
        assert_eq!(classify_location("Austin, TX"), LocationKind::City);
        assert_eq!(classify_location("Los Angeles, California"), LocationKind::City);
        assert_eq!(classify_location("Echo Park"), LocationKind::City);
    }

    #[test]
    fn state_city_budget_scales_with_profile() {
        assert_eq!(state_city_budget(CoverageProfile::Budget), 5);
        assert_eq!(state_city_budget(CoverageProfile::Aggressive), 50);
    }
}
