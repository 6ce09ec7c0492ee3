//! Greedy distance-based ZIP selection to minimize overlap between
//! neighbouring search cells.

use tracing::debug;

use super::catalog::haversine_miles;

/// A candidate ZIP with its blended score and gazetteer coordinates
/// (when the gazetteer knows it).
#[derive(Debug, Clone)]
pub struct ScoredZip {
    pub zip: String,
    pub density_score: f64,
    pub relevance_score: f64,
    /// `0.6 · density + 0.4 · relevance`.
    pub combined_score: f64,
    pub estimated_businesses: i32,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub population_density: Option<f64>,
}

/// Minimum ZIP spacing in miles for a population density, denser areas
/// packing tighter.
pub fn spacing_for_density(population_density: f64) -> f64 {
    if population_density >= 10_000.0 {
        2.0
    } else if population_density >= 5_000.0 {
        3.0
    } else if population_density >= 2_000.0 {
        5.0
    } else if population_density >= 500.0 {
        8.0
    } else {
        10.0
    }
}

/// Walk candidates by descending score, accepting each whose distance to
/// every already-accepted ZIP is at least `min_distance_miles`. Candidates
/// without coordinates cannot conflict spatially: they are accepted and do
/// not veto later picks.
pub fn select_spaced(
    candidates: &[ScoredZip],
    min_distance_miles: f64,
    max_zips: Option<usize>,
) -> Vec<ScoredZip> {
    let mut sorted: Vec<&ScoredZip> = candidates.iter().collect();
    sorted.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut selected: Vec<ScoredZip> = Vec::new();
    for candidate in sorted {
        if max_zips.is_some_and(|max| selected.len() >= max) {
            break;
        }

        let conflicts = match (candidate.lat, candidate.lng) {
            (Some(lat), Some(lng)) => selected.iter().any(|s| match (s.lat, s.lng) {
                (Some(s_lat), Some(s_lng)) => {
                    haversine_miles(lat, lng, s_lat, s_lng) < min_distance_miles
                }
                _ => false,
            }),
            _ => false,
        };

        if conflicts {
            debug!(zip = %candidate.zip, "Rejected: too close to an accepted ZIP");
            continue;
        }
        selected.push(candidate.clone());
    }

    selected
}

/// Spaced selection with relaxation: if fewer than `min_zips` survive the
/// threshold, retry at 0.7×; if still short, take the top-scored `min_zips`
/// regardless of spacing.
pub fn select_with_relaxation(
    candidates: &[ScoredZip],
    min_distance_miles: f64,
    min_zips: usize,
    max_zips: Option<usize>,
) -> Vec<ScoredZip> {
    let selected = select_spaced(candidates, min_distance_miles, max_zips);
    if selected.len() >= min_zips || selected.len() == candidates.len() {
        return selected;
    }

    let relaxed = min_distance_miles * 0.7;
    debug!(
        threshold = relaxed,
        selected = selected.len(),
        min_zips,
        "Too few ZIPs, relaxing spacing threshold"
    );
    let selected = select_spaced(candidates, relaxed, max_zips);
    if selected.len() >= min_zips || selected.len() == candidates.len() {
        return selected;
    }

    // Still short: take the best-scored candidates without spacing.
    let mut sorted: Vec<ScoredZip> = candidates.to_vec();
    sorted.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let take = min_zips.min(sorted.len());
    let take = max_zips.map_or(take, |max| take.min(max));
    sorted.truncate(take);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip(code: &str, score: f64, lat: f64, lng: f64) -> ScoredZip {
        ScoredZip {
            zip: code.to_string(),
            density_score: score,
            relevance_score: score,
            combined_score: score,
            estimated_businesses: 100,
            lat: Some(lat),
            lng: Some(lng),
            population_density: None,
        }
    }

    #[test]
    fn spacing_bands_match_density() {
        assert_eq!(spacing_for_density(25_000.0), 2.0);
        assert_eq!(spacing_for_density(6_000.0), 3.0);
        assert_eq!(spacing_for_density(3_000.0), 5.0);
        assert_eq!(spacing_for_density(800.0), 8.0);
        assert_eq!(spacing_for_density(100.0), 10.0);
    }

    #[test]
    fn close_pairs_are_thinned_by_score() {
        // Two nearly-colocated ZIPs and one distant: the lower-scored of the
        // close pair should be rejected.
        let candidates = vec![
            zip("90001", 9.0, 34.00, -118.24),
            zip("90002", 8.0, 34.01, -118.25), // < 1 mile from 90001
            zip("90210", 7.0, 34.09, -118.41),
        ];
        let selected = select_spaced(&candidates, 3.0, None);
        let zips: Vec<&str> = selected.iter().map(|z| z.zip.as_str()).collect();
        assert_eq!(zips, vec!["90001", "90210"]);
    }

    #[test]
    fn max_zips_caps_selection() {
        let candidates = vec![
            zip("a", 9.0, 30.0, -97.0),
            zip("b", 8.0, 31.0, -97.0),
            zip("c", 7.0, 32.0, -97.0),
        ];
        let selected = select_spaced(&candidates, 1.0, Some(2));
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn unknown_coordinates_are_accepted_without_veto() {
        let mut unknown = zip("99999", 9.5, 0.0, 0.0);
        unknown.lat = None;
        unknown.lng = None;
        let candidates = vec![
            unknown,
            zip("90001", 9.0, 34.00, -118.24),
            zip("90002", 8.0, 34.01, -118.25),
        ];
        let selected = select_spaced(&candidates, 3.0, None);
        let zips: Vec<&str> = selected.iter().map(|z| z.zip.as_str()).collect();
        // 99999 accepted, 90002 rejected against 90001 only.
        assert_eq!(zips, vec!["99999", "90001"]);
    }

    #[test]
    fn relaxation_falls_back_to_top_n() {
        // Three ZIPs inside one mile of each other: strict spacing keeps one,
        // relaxation cannot reach min_zips=3, so top-3 by score win.
        let candidates = vec![
            zip("a", 9.0, 34.000, -118.240),
            zip("b", 8.0, 34.002, -118.241),
            zip("c", 7.0, 34.004, -118.242),
            zip("d", 6.0, 34.006, -118.243),
        ];
        let selected = select_with_relaxation(&candidates, 5.0, 3, Some(10));
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0].zip, "a");
        assert_eq!(selected[2].zip, "c");
    }

    #[test]
    fn short_candidate_lists_return_whatever_exists() {
        let candidates = vec![zip("a", 9.0, 30.0, -97.0)];
        let selected = select_with_relaxation(&candidates, 5.0, 5, None);
        assert_eq!(selected.len(), 1);
    }
}
