//! Pure extraction helpers over the raw place payload.
//!
//! The map actor's schema is loose; everything here must tolerate missing
//! or oddly-shaped keys and return defaults rather than erroring.

use serde_json::Value;

/// Structured ownership/payment/accessibility flags derived from the
/// `additionalInfo` attribute buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusinessAttributes {
    pub is_women_owned: bool,
    pub is_small_business: bool,
    pub is_veteran_owned: bool,
    pub is_minority_owned: bool,
    pub accepts_credit_cards: bool,
    pub accepts_nfc_payments: bool,
    pub is_wheelchair_accessible: bool,
    pub appointment_required: bool,
}

/// Flatten `additionalInfo`, a map of category → [{label: bool}] buckets,
/// into flags keyed on label substrings.
pub fn extract_attributes(raw: &Value) -> BusinessAttributes {
    let mut attrs = BusinessAttributes::default();

    let Some(info) = raw.get("additionalInfo").and_then(|v| v.as_object()) else {
        return attrs;
    };

    let mut labels: Vec<String> = Vec::new();
    for items in info.values() {
        let Some(items) = items.as_array() else {
            continue;
        };
        for item in items {
            let Some(obj) = item.as_object() else {
                continue;
            };
            for (key, value) in obj {
                if value.as_bool() == Some(true) {
                    labels.push(key.to_lowercase());
                }
            }
        }
    }
    let text = labels.join(" ");

    attrs.is_women_owned = text.contains("women") || text.contains("woman");
    attrs.is_small_business = text.contains("small business");
    attrs.is_veteran_owned = text.contains("veteran");
    attrs.is_minority_owned =
        text.contains("minority") || text.contains("black") || text.contains("lgbtq");
    attrs.accepts_credit_cards = text.contains("credit card") || text.contains("debit card");
    attrs.accepts_nfc_payments =
        text.contains("nfc") || text.contains("contactless") || text.contains("mobile payment");
    attrs.is_wheelchair_accessible = text.contains("wheelchair");
    attrs.appointment_required = text.contains("appointment");

    attrs
}

/// Booking capability from `bookingLinks` / `reserveTableUrl` /
/// `tableReservationLinks`, whichever the actor populated.
pub fn extract_booking(raw: &Value) -> (bool, Option<String>) {
    let mut has_booking = false;
    let mut booking_url: Option<String> = None;

    let first_link = |v: &Value| -> Option<String> {
        let arr = v.as_array()?;
        let first = arr.first()?;
        if let Some(s) = first.as_str() {
            return Some(s.to_string());
        }
        let obj = first.as_object()?;
        obj.get("url")
            .or_else(|| obj.get("link"))
            .and_then(|u| u.as_str())
            .map(|s| s.to_string())
    };

    if let Some(links) = raw.get("bookingLinks") {
        if links.as_array().is_some_and(|a| !a.is_empty()) {
            has_booking = true;
            booking_url = first_link(links);
        }
    }

    if let Some(reserve) = raw.get("reserveTableUrl").and_then(|v| v.as_str()) {
        has_booking = true;
        booking_url = booking_url.or_else(|| Some(reserve.to_string()));
    }

    if let Some(links) = raw.get("tableReservationLinks") {
        if links.as_array().is_some_and(|a| !a.is_empty()) {
            has_booking = true;
            booking_url = booking_url.or_else(|| first_link(links));
        }
    }

    (has_booking, booking_url)
}

/// Five-star share (percent, 2dp) from the `reviewsDistribution` histogram
/// and up to 10 sentiment tags from `reviewsTags`.
pub fn extract_review_metrics(raw: &Value) -> (Option<f64>, Vec<String>) {
    let five_star_percent = raw
        .get("reviewsDistribution")
        .and_then(|v| v.as_object())
        .and_then(|dist| {
            let star = |k: &str| dist.get(k).and_then(|v| v.as_i64()).unwrap_or(0);
            let five = star("fiveStar");
            let total =
                star("oneStar") + star("twoStar") + star("threeStar") + star("fourStar") + five;
            if total > 0 {
                Some(((five as f64 / total as f64) * 10_000.0).round() / 100.0)
            } else {
                None
            }
        });

    let mut tags = Vec::new();
    if let Some(raw_tags) = raw.get("reviewsTags").and_then(|v| v.as_array()) {
        for tag in raw_tags.iter().take(10) {
            let text = match tag {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj
                    .get("tag")
                    .or_else(|| obj.get("text"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                _ => None,
            };
            if let Some(t) = text {
                if !t.is_empty() {
                    tags.push(t);
                }
            }
        }
    }

    (five_star_percent, tags)
}

/// Nearby competitors from `peopleAlsoSearch`, capped at 10.
/// Returns `(count, competitors-as-json)`.
pub fn extract_competitors(raw: &Value) -> (i32, Value) {
    let mut competitors = Vec::new();
    if let Some(items) = raw.get("peopleAlsoSearch").and_then(|v| v.as_array()) {
        for item in items.iter().take(10) {
            let Some(obj) = item.as_object() else {
                continue;
            };
            competitors.push(serde_json::json!({
                "name": obj.get("title").and_then(|v| v.as_str()).unwrap_or(""),
                "rating": obj.get("totalScore"),
                "reviews": obj.get("reviewsCount"),
            }));
        }
    }
    (competitors.len() as i32, Value::Array(competitors))
}

/// First Facebook URL from the payload: the plural `facebooks` field,
/// singular fallbacks, or a website that is itself a Facebook page.
pub fn extract_facebook_url(raw: &Value) -> Option<String> {
    if let Some(first) = raw
        .get("facebooks")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|v| v.as_str())
    {
        return Some(first.to_string());
    }

    for key in ["facebookUrl", "facebook"] {
        if let Some(url) = raw.get(key).and_then(|v| v.as_str()) {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
    }

    let website = raw.get("website").and_then(|v| v.as_str()).unwrap_or("");
    if website.to_lowercase().contains("facebook.com") {
        return Some(website.to_string());
    }

    None
}

/// First LinkedIn URL from the payload (`linkedIns` plural, then singular).
pub fn extract_linkedin_url(raw: &Value) -> Option<String> {
    if let Some(first) = raw
        .get("linkedIns")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|v| v.as_str())
    {
        return Some(first.to_string());
    }

    for key in ["linkedinUrl", "linkedin"] {
        if let Some(url) = raw.get(key).and_then(|v| v.as_str()) {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
    }

    None
}

/// First Instagram URL from the payload.
pub fn extract_instagram_url(raw: &Value) -> Option<String> {
    raw.get("instagrams")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Parse a first/last name pair from a personal profile URL slug
/// (`/in/dr-allie-day-goodwin-a775188` → `Allie`, `Day Goodwin`).
/// Trailing hash/number IDs and credential prefixes are stripped.
pub fn contact_name_from_profile_url(url: &str) -> Option<(String, Option<String>)> {
    let idx = url.find("/in/")?;
    let slug = &url[idx + 4..];
    let slug: &str = slug.split(['/', '?', '#']).next().unwrap_or("");
    if slug.is_empty() {
        return None;
    }

    let mut parts: Vec<&str> = slug.split('-').filter(|p| !p.is_empty()).collect();

    // Drop a trailing ID segment: long hex or 5+ digit suffixes.
    if let Some(last) = parts.last() {
        let is_hex_id = last.len() >= 6 && last.chars().all(|c| c.is_ascii_hexdigit());
        let is_numeric_id = last.len() >= 5 && last.chars().all(|c| c.is_ascii_digit());
        if is_hex_id || is_numeric_id {
            parts.pop();
        }
    }

    const PREFIXES: [&str; 12] = [
        "dr", "md", "phd", "dds", "dc", "do", "dvm", "esq", "jr", "sr", "ii", "iii",
    ];
    let filtered: Vec<&str> = parts
        .into_iter()
        .filter(|p| !PREFIXES.contains(&p.to_lowercase().as_str()))
        .collect();

    let title_case = |s: &str| -> String {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    };

    match filtered.len() {
        0 => None,
        1 => Some((title_case(filtered[0]), None)),
        _ => {
            let first = title_case(filtered[0]);
            let last = filtered[1..]
                .iter()
                .map(|p| title_case(p))
                .collect::<Vec<_>>()
                .join(" ");
            Some((first, Some(last)))
        }
    }
}

/// Pull a 5-digit ZIP out of a US street address. Prefers the explicit
/// `postalCode` field; falls back to scanning the address tail.
pub fn extract_zip(raw: &Value) -> Option<String> {
    if let Some(zip) = raw.get("postalCode").and_then(|v| v.as_str()) {
        let five: String = zip.chars().take_while(|c| c.is_ascii_digit()).collect();
        if five.len() == 5 {
            return Some(five);
        }
    }

    let address = raw.get("address").and_then(|v| v.as_str())?;
    zip_from_address(address)
}

/// Scan an address string for its trailing 5-digit ZIP.
pub fn zip_from_address(address: &str) -> Option<String> {
    let mut found: Option<String> = None;
    let mut digits = String::new();
    for c in address.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            if digits.len() == 5 {
                found = Some(digits.clone());
            }
            digits.clear();
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attributes_from_nested_buckets() {
        let raw = json!({
            "additionalInfo": {
                "From the business": [
                    {"Identifies as women-owned": true},
                    {"Small business": true}
                ],
                "Payments": [{"Credit cards": true}, {"NFC mobile payments": false}],
                "Accessibility": [{"Wheelchair accessible entrance": true}]
            }
        });
        let attrs = extract_attributes(&raw);
        assert!(attrs.is_women_owned);
        assert!(attrs.is_small_business);
        assert!(attrs.accepts_credit_cards);
        assert!(!attrs.accepts_nfc_payments);
        assert!(attrs.is_wheelchair_accessible);
        assert!(!attrs.is_veteran_owned);
    }

    #[test]
    fn attributes_tolerate_missing_bag() {
        assert_eq!(extract_attributes(&json!({})), BusinessAttributes::default());
        assert_eq!(
            extract_attributes(&json!({"additionalInfo": null})),
            BusinessAttributes::default()
        );
    }

    #[test]
    fn booking_prefers_booking_links() {
        let raw = json!({
            "bookingLinks": [{"url": "https://book.example.com"}],
            "reserveTableUrl": "https://reserve.example.com"
        });
        let (has, url) = extract_booking(&raw);
        assert!(has);
        assert_eq!(url.as_deref(), Some("https://book.example.com"));

        let raw = json!({"reserveTableUrl": "https://reserve.example.com"});
        let (has, url) = extract_booking(&raw);
        assert!(has);
        assert_eq!(url.as_deref(), Some("https://reserve.example.com"));

        assert_eq!(extract_booking(&json!({})), (false, None));
    }

    #[test]
    fn five_star_percent_from_histogram() {
        let raw = json!({
            "reviewsDistribution": {
                "oneStar": 5, "twoStar": 5, "threeStar": 10, "fourStar": 30, "fiveStar": 50
            },
            "reviewsTags": [{"tag": "friendly staff"}, "clean office"]
        });
        let (pct, tags) = extract_review_metrics(&raw);
        assert_eq!(pct, Some(50.0));
        assert_eq!(tags, vec!["friendly staff".to_string(), "clean office".to_string()]);
    }

    #[test]
    fn empty_histogram_yields_none() {
        let raw = json!({"reviewsDistribution": {}});
        let (pct, tags) = extract_review_metrics(&raw);
        assert_eq!(pct, None);
        assert!(tags.is_empty());
    }

    #[test]
    fn competitors_capped_at_ten() {
        let items: Vec<_> = (0..15)
            .map(|i| json!({"title": format!("Comp {i}"), "totalScore": 4.0, "reviewsCount": i}))
            .collect();
        let raw = json!({"peopleAlsoSearch": items});
        let (count, competitors) = extract_competitors(&raw);
        assert_eq!(count, 10);
        assert_eq!(competitors.as_array().unwrap().len(), 10);
    }

    #[test]
    fn facebook_url_from_plural_field() {
        let raw = json!({"facebooks": ["https://facebook.com/acme"], "website": "https://acme.com"});
        assert_eq!(
            extract_facebook_url(&raw).as_deref(),
            Some("https://facebook.com/acme")
        );
    }

    #[test]
    fn facebook_url_from_website_fallback() {
        let raw = json!({"website": "https://www.Facebook.com/acme"});
        assert_eq!(
            extract_facebook_url(&raw).as_deref(),
            Some("https://www.Facebook.com/acme")
        );
        assert_eq!(extract_facebook_url(&json!({"website": "https://acme.com"})), None);
    }

    #[test]
    fn contact_name_strips_ids_and_prefixes() {
        let (first, last) =
            contact_name_from_profile_url("https://www.linkedin.com/in/dr-allie-day-goodwin-a775188")
                .unwrap();
        assert_eq!(first, "Allie");
        assert_eq!(last.as_deref(), Some("Day Goodwin"));

        let (first, last) =
            contact_name_from_profile_url("https://linkedin.com/in/jane-doe/").unwrap();
        assert_eq!(first, "Jane");
        assert_eq!(last.as_deref(), Some("Doe"));

        assert!(contact_name_from_profile_url("https://linkedin.com/company/acme").is_none());
    }

    #[test]
    fn zip_extraction_prefers_postal_code() {
        let raw = json!({"postalCode": "78701-1234", "address": "1 Main St, Austin, TX 78799"});
        assert_eq!(extract_zip(&raw).as_deref(), Some("78701"));

        let raw = json!({"address": "1 Main St, Austin, TX 78701, United States"});
        assert_eq!(extract_zip(&raw).as_deref(), Some("78701"));

        assert_eq!(extract_zip(&json!({"address": "somewhere"})), None);
    }

    #[test]
    fn zip_from_address_takes_last_five_digit_run() {
        assert_eq!(
            zip_from_address("123 Main St Suite 20000, Austin, TX 78701").as_deref(),
            Some("78701")
        );
        assert_eq!(zip_from_address("no digits here"), None);
        // 4- and 6-digit runs are not ZIPs
        assert_eq!(zip_from_address("PO Box 1234, 123456"), None);
    }
}
