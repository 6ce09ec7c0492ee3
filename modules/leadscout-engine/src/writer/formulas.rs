//! Formula routing for outreach copy: template mapping, signal-weighted
//! random selection, deterministic A/B variants, and subject-line styles.

use rand::Rng;

/// The rhetorical structures an icebreaker can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formula {
    WebsiteInsight,
    LocalContext,
    IndustryQuestion,
    SocialProof,
    DirectValue,
    CuriosityHook,
    ProblemAgitation,
}

impl Formula {
    pub fn as_str(&self) -> &'static str {
        match self {
            Formula::WebsiteInsight => "website_insight",
            Formula::LocalContext => "local_context",
            Formula::IndustryQuestion => "industry_question",
            Formula::SocialProof => "social_proof",
            Formula::DirectValue => "direct_value",
            Formula::CuriosityHook => "curiosity_hook",
            Formula::ProblemAgitation => "problem_agitation",
        }
    }
}

/// An explicit campaign template pins the formula; anything else is `auto`.
pub fn formula_for_template(template: &str) -> Option<Formula> {
    match template {
        "specific_question" => Some(Formula::IndustryQuestion),
        "peer_social_proof" => Some(Formula::SocialProof),
        "website_insight" => Some(Formula::WebsiteInsight),
        "problem_agitation" => Some(Formula::ProblemAgitation),
        "curiosity_hook" => Some(Formula::CuriosityHook),
        "direct_value" => Some(Formula::DirectValue),
        _ => None,
    }
}

/// Formula weights for auto mode, boosted when the matching signal exists:
/// website insight needs page content, local context needs a city, direct
/// value fires best on a perfect category fit.
pub fn formula_weights(
    has_website_content: bool,
    has_city: bool,
    is_perfect_fit: bool,
) -> [(Formula, f64); 7] {
    [
        (
            Formula::WebsiteInsight,
            if has_website_content { 3.0 } else { 0.5 },
        ),
        (Formula::LocalContext, if has_city { 2.0 } else { 1.0 }),
        (Formula::IndustryQuestion, 2.0),
        (Formula::SocialProof, 1.5),
        (Formula::DirectValue, if is_perfect_fit { 2.0 } else { 1.0 }),
        (Formula::CuriosityHook, 1.5),
        (Formula::ProblemAgitation, 1.5),
    ]
}

/// Weighted random pick.
pub fn choose_formula<R: Rng>(weights: &[(Formula, f64)], rng: &mut R) -> Formula {
    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    let mut roll = rng.random_range(0.0..total);
    for (formula, weight) in weights {
        if roll < *weight {
            return *formula;
        }
        roll -= weight;
    }
    weights[weights.len() - 1].0
}

/// Subject-line styles, one chosen uniformly at random per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectStyle {
    BusinessName,
    CityCategory,
    Question,
    ReStyle,
    Direct,
    Curiosity,
}

pub const SUBJECT_STYLES: [SubjectStyle; 6] = [
    SubjectStyle::BusinessName,
    SubjectStyle::CityCategory,
    SubjectStyle::Question,
    SubjectStyle::ReStyle,
    SubjectStyle::Direct,
    SubjectStyle::Curiosity,
];

impl SubjectStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectStyle::BusinessName => "business_name",
            SubjectStyle::CityCategory => "city_category",
            SubjectStyle::Question => "question",
            SubjectStyle::ReStyle => "re_style",
            SubjectStyle::Direct => "direct",
            SubjectStyle::Curiosity => "curiosity",
        }
    }

    pub fn instruction(&self, business_name: &str, city: &str, category: &str) -> String {
        match self {
            SubjectStyle::BusinessName => {
                format!("Use \"{}\" in the subject", clip(business_name, 20))
            }
            SubjectStyle::CityCategory => format!("Use \"{city} {category}\" format"),
            SubjectStyle::Question => "Ask a short question".to_string(),
            SubjectStyle::ReStyle => format!(
                "Use \"re: {}\" style, like a reply",
                clip(business_name, 15)
            ),
            SubjectStyle::Direct => "State the benefit directly".to_string(),
            SubjectStyle::Curiosity => "Create curiosity about something specific".to_string(),
        }
    }
}

pub fn choose_subject_style<R: Rng>(rng: &mut R) -> SubjectStyle {
    SUBJECT_STYLES[rng.random_range(0..SUBJECT_STYLES.len())]
}

/// FNV-1a, used for variant assignment because it is stable across runs
/// (the std hasher is randomly seeded per process).
fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x100_0000_01b3;
    let mut hash = OFFSET;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Deterministic A/B bucket: the same prospect in the same campaign always
/// lands in the same variant, across reruns.
pub fn assign_variant(business_id: &str, campaign_id: &str, buckets: u32) -> i32 {
    let key = format!("{business_id}_{campaign_id}");
    (fnv1a64(key.as_bytes()) % buckets as u64) as i32
}

/// Hard cap on subject length, truncating with an ellipsis.
pub fn enforce_subject_cap(subject: &str) -> String {
    const MAX: usize = 40;
    let chars: Vec<char> = subject.chars().collect();
    if chars.len() <= MAX {
        return subject.to_string();
    }
    let mut clipped: String = chars[..MAX - 3].iter().collect();
    clipped.push_str("...");
    clipped
}

/// Fallback subjects avoid the spam-flagged generic shapes.
pub fn fallback_subject<R: Rng>(
    business_name: &str,
    city: &str,
    category: &str,
    rng: &mut R,
) -> String {
    let candidates = [
        format!("{} → more customers", clip(business_name, 20)),
        if !city.is_empty() && !category.is_empty() {
            format!("{city} {}", clip(category, 15))
        } else {
            format!("{} tip", clip(category, 20))
        },
        format!("{} opportunity", clip(business_name, 15)),
        format!("Idea for {}", clip(business_name, 18)),
    ];
    let pick = rng.random_range(0..candidates.len());
    enforce_subject_cap(&candidates[pick])
}

/// Deterministic fallback body assembled from whatever fields exist. Used
/// when the model is unreachable so a campaign never loses a prospect to a
/// writer outage.
pub fn fallback_icebreaker(
    business_name: &str,
    category: &str,
    city: &str,
    rating: Option<f64>,
) -> String {
    let location = if city.is_empty() {
        String::new()
    } else {
        format!(" in {city}")
    };
    let rating_note = rating
        .map(|r| format!(" with a {r}-star rating"))
        .unwrap_or_default();
    format!(
        "Hey - noticed {business_name} is a {category}{location}{rating_note}.\n\n\
         We work with local {category} teams on bringing in more of the right customers.\n\n\
         Could you forward this to the owner or whoever handles new partnerships?"
    )
}

fn clip(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_is_deterministic_across_calls() {
        let a = assign_variant("biz-1", "camp-1", 2);
        for _ in 0..10 {
            assert_eq!(assign_variant("biz-1", "camp-1", 2), a);
        }
        // Different prospects can land in different buckets.
        let spread: std::collections::HashSet<i32> = (0..100)
            .map(|i| assign_variant(&format!("biz-{i}"), "camp-1", 2))
            .collect();
        assert_eq!(spread.len(), 2);
    }

    #[test]
    fn subject_cap_truncates_with_ellipsis() {
        let long = "a subject line that is far far far too long for a mobile inbox";
        let capped = enforce_subject_cap(long);
        assert_eq!(capped.chars().count(), 40);
        assert!(capped.ends_with("..."));

        assert_eq!(enforce_subject_cap("short"), "short");
    }

    #[test]
    fn template_mapping_is_complete() {
        for template in [
            "specific_question",
            "peer_social_proof",
            "website_insight",
            "problem_agitation",
            "curiosity_hook",
            "direct_value",
        ] {
            assert!(formula_for_template(template).is_some(), "{template}");
        }
        assert!(formula_for_template("auto").is_none());
    }

    #[test]
    fn website_weight_collapses_without_content() {
        let with = formula_weights(true, true, false);
        let without = formula_weights(false, true, false);
        assert_eq!(with[0].1, 3.0);
        assert_eq!(without[0].1, 0.5);
    }

    #[test]
    fn weighted_choice_respects_zeroed_out_weights() {
        let mut rng = rand::rng();
        let weights = [
            (Formula::WebsiteInsight, 0.0),
            (Formula::LocalContext, 0.0),
            (Formula::IndustryQuestion, 1.0),
            (Formula::SocialProof, 0.0),
            (Formula::DirectValue, 0.0),
            (Formula::CuriosityHook, 0.0),
            (Formula::ProblemAgitation, 0.0),
        ];
        for _ in 0..20 {
            assert_eq!(choose_formula(&weights, &mut rng), Formula::IndustryQuestion);
        }
    }

    #[test]
    fn fallback_subject_stays_under_cap_and_avoids_generics() {
        let mut rng = rand::rng();
        for _ in 0..20 {
            let subject = fallback_subject("Acme Dental Group of Greater Austin", "Austin", "dentist", &mut rng);
            assert!(subject.chars().count() <= 40);
            assert!(!subject.to_lowercase().contains("quick question"));
        }
    }

    #[test]
    fn fallback_icebreaker_uses_available_fields() {
        let body = fallback_icebreaker("Acme Dental", "dentist", "Austin", Some(4.8));
        assert!(body.contains("Acme Dental"));
        assert!(body.contains("in Austin"));
        assert!(body.contains("4.8-star"));

        let sparse = fallback_icebreaker("Acme", "salon", "", None);
        assert!(!sparse.contains(" in "));
    }
}
