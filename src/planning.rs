//! Launch planning rules for ad-platform workers.
//!
//! Pure functions: budget split, bidding bounds, conversion-tag parsing, location
//! bucketing, keyword distribution and ad copy assembly. Workers call these between
//! their outbound API calls.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::country_codes::normalize_country;
use crate::errors::AppError;
use crate::models::{Location, Product};

const MS_PER_DAY: i64 = 86_400_000;

/// Upper bound applied to the target ROAS reported by the business rules.
pub const MAX_TARGET_ROAS: f64 = 1000.0;

pub const MAX_HEADLINE_CHARS: usize = 30;
pub const MAX_DESCRIPTION_CHARS: usize = 90;
const MAX_HEADLINES: usize = 15;
const MIN_HEADLINES: usize = 3;
const MAX_DESCRIPTIONS: usize = 4;
const MIN_DESCRIPTIONS: usize = 2;

/// Number of calendar days covered by `[start, end]`, counting both ends.
pub fn campaign_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().div_euclid(MS_PER_DAY) + 1
}

/// Rejects a start that falls on a calendar day (UTC) before `now`.
///
/// A start earlier on the same day is accepted.
pub fn ensure_start_not_past(start: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), AppError> {
    if start.date_naive() < now.date_naive() {
        return Err(AppError::BadRequest(
            "Campaign start date is in the past".to_string(),
        ));
    }
    Ok(())
}

/// Splits the total budget evenly across the campaign days, floored to cents.
///
/// Fails when the budget is not a positive number, the end precedes the start or
/// the start falls on a day before `now`.
pub fn daily_budget(
    total_budget: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<f64, AppError> {
    if !total_budget.is_finite() || total_budget <= 0.0 {
        return Err(AppError::BadRequest(format!(
            "Invalid total budget: {}",
            total_budget
        )));
    }
    if end < start {
        return Err(AppError::BadRequest(
            "Campaign end date precedes its start date".to_string(),
        ));
    }
    ensure_start_not_past(start, now)?;

    let days = campaign_days(start, end);
    Ok((total_budget / days as f64 * 100.0).floor() / 100.0)
}

pub fn target_roas(reported_roas: f64) -> f64 {
    reported_roas.min(MAX_TARGET_ROAS)
}

/// CPC bid floor and ceiling: 20% and 80% of the daily budget over ten, rounded up.
pub fn cpc_bid_bounds(daily_budget: f64) -> (f64, f64) {
    (
        (daily_budget * 0.2 / 10.0).ceil(),
        (daily_budget * 0.8 / 10.0).ceil(),
    )
}

/// Converts a currency amount to Google Ads micros.
pub fn to_micros(amount: f64) -> i64 {
    (amount * 1_000_000.0).round() as i64
}

fn send_to_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"['"]send_to['"]\s*:\s*\[?\s*['"](AW-\d+)/([^'"\s\]]+)['"]"#)
            .expect("send_to pattern is valid")
    })
}

/// Extracts `(conversion_tag, label)` from a conversion event snippet.
///
/// `"send_to": ["AW-123456/AbCdEfG"]` yields `("AW-123456", "AbCdEfG")`.
pub fn parse_conversion_tag(event_snippet: &str) -> Option<(String, String)> {
    send_to_regex()
        .captures(event_snippet)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}

/// Groups locations by alpha-2 country code.
///
/// Locations whose country cannot be normalized are dropped.
pub fn bucket_locations(locations: &[Location]) -> BTreeMap<String, Vec<Location>> {
    let mut buckets: BTreeMap<String, Vec<Location>> = BTreeMap::new();

    for location in locations {
        match normalize_country(&location.country) {
            Some(code) => buckets.entry(code).or_default().push(location.clone()),
            None => {
                tracing::warn!(
                    "Dropping location with unknown country code '{}'",
                    location.country
                );
            }
        }
    }

    buckets
}

/// Names to resolve into geo targets for one country bucket.
///
/// Cities are preferred, then states; an empty list means the whole country.
pub fn location_names(locations: &[Location]) -> Vec<String> {
    let mut names: Vec<String> = locations
        .iter()
        .filter_map(|l| {
            l.city
                .as_deref()
                .or(l.state.as_deref())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Distributes keywords across ad groups: keyword `i` goes to group `i % n`.
pub fn assign_keywords_round_robin(keywords: &[String], ad_group_count: usize) -> Vec<Vec<String>> {
    if ad_group_count == 0 {
        return Vec::new();
    }

    let mut groups = vec![Vec::new(); ad_group_count];
    for (i, keyword) in keywords.iter().enumerate() {
        groups[i % ad_group_count].push(keyword.clone());
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordMatchType {
    Exact,
    Broad,
    Phrase,
}

impl KeywordMatchType {
    /// Every keyword is pushed once per match type, in this order.
    pub const VARIANTS: [KeywordMatchType; 3] = [
        KeywordMatchType::Exact,
        KeywordMatchType::Broad,
        KeywordMatchType::Phrase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordMatchType::Exact => "EXACT",
            KeywordMatchType::Broad => "BROAD",
            KeywordMatchType::Phrase => "PHRASE",
        }
    }
}

// Deterministic resource names; lookups by these names make every creation step
// safe to repeat after a redelivery.

pub fn budget_name(campaign_id: Uuid) -> String {
    format!("campaign-{}-budget", campaign_id)
}

pub fn bidding_strategy_name(campaign_id: Uuid) -> String {
    format!("campaign-{}-bidding", campaign_id)
}

pub fn campaign_name(campaign_id: Uuid) -> String {
    format!("campaign-{}", campaign_id)
}

pub fn ad_group_name(campaign_id: Uuid, index: usize) -> String {
    format!("campaign-{}-adgroup-{}", campaign_id, index)
}

pub fn ad_name(campaign_id: Uuid, index: usize) -> String {
    format!("campaign-{}-ad-{}", campaign_id, index)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect::<String>().trim_end().to_string()
}

fn push_unique(target: &mut Vec<String>, candidate: &str, max_chars: usize) {
    let text = truncate_chars(candidate, max_chars);
    if !text.is_empty() && !target.iter().any(|t| t.eq_ignore_ascii_case(&text)) {
        target.push(text);
    }
}

/// Headlines and descriptions of a responsive search ad.
#[derive(Debug, Clone, PartialEq)]
pub struct AdCopy {
    pub headlines: Vec<String>,
    pub descriptions: Vec<String>,
}

/// Builds responsive search ad copy for a product.
pub fn build_ad_copy(product: &Product, business_name: &str) -> AdCopy {
    let mut headlines = Vec::new();
    push_unique(&mut headlines, &product.title, MAX_HEADLINE_CHARS);
    for creative in &product.creatives {
        if let Some(headline) = &creative.headline {
            push_unique(&mut headlines, headline, MAX_HEADLINE_CHARS);
        }
    }
    for feature in &product.features {
        push_unique(&mut headlines, feature, MAX_HEADLINE_CHARS);
    }
    push_unique(&mut headlines, &format!("Only ${:.2}", product.price), MAX_HEADLINE_CHARS);
    push_unique(&mut headlines, &format!("Shop {}", business_name), MAX_HEADLINE_CHARS);
    for filler in ["Shop Now", "Order Online Today", "Fast Delivery"] {
        if headlines.len() >= MIN_HEADLINES {
            break;
        }
        push_unique(&mut headlines, filler, MAX_HEADLINE_CHARS);
    }
    headlines.truncate(MAX_HEADLINES);

    let mut descriptions = Vec::new();
    if let Some(description) = &product.description {
        push_unique(&mut descriptions, description, MAX_DESCRIPTION_CHARS);
    }
    for creative in &product.creatives {
        if let Some(description) = &creative.description {
            push_unique(&mut descriptions, description, MAX_DESCRIPTION_CHARS);
        }
    }
    if !product.features.is_empty() {
        push_unique(
            &mut descriptions,
            &product.features.join(" · "),
            MAX_DESCRIPTION_CHARS,
        );
    }
    for filler in [
        format!("Discover {} at {}.", product.title, business_name),
        "Order online today and enjoy a smooth checkout.".to_string(),
    ] {
        if descriptions.len() >= MIN_DESCRIPTIONS {
            break;
        }
        push_unique(&mut descriptions, &filler, MAX_DESCRIPTION_CHARS);
    }
    descriptions.truncate(MAX_DESCRIPTIONS);

    AdCopy {
        headlines,
        descriptions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_budget_inclusive_days() {
        let now = at(2030, 1, 1);
        // 10 days inclusive
        assert_eq!(daily_budget(1000.0, at(2030, 1, 1), at(2030, 1, 10), now).unwrap(), 100.0);
        // same-day campaign counts as one day
        assert_eq!(daily_budget(55.5, at(2030, 1, 2), at(2030, 1, 2), now).unwrap(), 55.5);
        // floored to cents
        assert_eq!(daily_budget(100.0, at(2030, 1, 1), at(2030, 1, 3), now).unwrap(), 33.33);
    }

    #[test]
    fn test_daily_budget_rejects_bad_dates() {
        let now = at(2030, 1, 5);
        assert!(matches!(
            daily_budget(100.0, at(2030, 1, 10), at(2030, 1, 9), now),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            daily_budget(100.0, at(2030, 1, 4), at(2030, 1, 9), now),
            Err(AppError::BadRequest(_))
        ));
        assert!(daily_budget(0.0, at(2030, 1, 6), at(2030, 1, 9), now).is_err());
        assert!(daily_budget(f64::NAN, at(2030, 1, 6), at(2030, 1, 9), now).is_err());
    }

    #[test]
    fn test_start_later_today_is_not_past() {
        let now = Utc.with_ymd_and_hms(2030, 1, 5, 18, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2030, 1, 5, 9, 0, 0).unwrap();
        assert!(daily_budget(10.0, start, at(2030, 1, 6), now).is_ok());
    }

    #[test]
    fn test_target_roas_capped() {
        assert_eq!(target_roas(4.5), 4.5);
        assert_eq!(target_roas(1000.0), 1000.0);
        assert_eq!(target_roas(2500.0), 1000.0);
    }

    #[test]
    fn test_cpc_bounds() {
        assert_eq!(cpc_bid_bounds(100.0), (2.0, 8.0));
        assert_eq!(cpc_bid_bounds(33.33), (1.0, 3.0));
        assert_eq!(to_micros(2.0), 2_000_000);
    }

    #[test]
    fn test_parse_conversion_tag() {
        let snippet = r#"gtag('event', 'conversion', {"send_to": ["AW-123456/AbCdEfG"]});"#;
        assert_eq!(
            parse_conversion_tag(snippet),
            Some(("AW-123456".to_string(), "AbCdEfG".to_string()))
        );

        let single = r#"gtag('event', 'conversion', {'send_to': 'AW-987/xYz_1-2', 'value': 1.0});"#;
        assert_eq!(
            parse_conversion_tag(single),
            Some(("AW-987".to_string(), "xYz_1-2".to_string()))
        );

        assert_eq!(parse_conversion_tag("<script></script>"), None);
    }

    #[test]
    fn test_bucket_locations_drops_unknown_codes() {
        let locations = vec![
            Location {
                country: "USA".into(),
                state: Some("NY".into()),
                city: Some("NYC".into()),
            },
            Location {
                country: "CAN".into(),
                state: Some("ON".into()),
                city: Some("Toronto".into()),
            },
            Location {
                country: "QQQ".into(),
                state: None,
                city: None,
            },
        ];

        let buckets = bucket_locations(&locations);
        assert_eq!(buckets.keys().cloned().collect::<Vec<_>>(), vec!["CA", "US"]);
        assert_eq!(buckets["US"][0].city.as_deref(), Some("NYC"));
        assert_eq!(location_names(&buckets["CA"]), vec!["Toronto".to_string()]);
    }

    #[test]
    fn test_location_names_fall_back_to_state() {
        let locations = vec![
            Location {
                country: "US".into(),
                state: Some("Texas".into()),
                city: None,
            },
            Location {
                country: "US".into(),
                state: Some("Texas".into()),
                city: Some(" ".into()),
            },
        ];
        // A blank city does not fall back; only missing ones do
        assert_eq!(location_names(&locations), vec!["Texas".to_string()]);
    }

    #[test]
    fn test_round_robin_assignment() {
        let keywords: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        let groups = assign_keywords_round_robin(&keywords, 2);
        assert_eq!(groups, vec![vec!["a", "c", "e"], vec!["b", "d"]]);
        assert!(assign_keywords_round_robin(&keywords, 0).is_empty());
    }

    #[test]
    fn test_resource_names_are_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(budget_name(id), budget_name(id));
        assert_ne!(ad_group_name(id, 0), ad_group_name(id, 1));
        assert!(campaign_name(id).ends_with(&id.to_string()));
    }

    #[test]
    fn test_ad_copy_respects_limits() {
        let product = Product {
            title: "Ultra Comfortable Organic Cotton Hoodie".into(),
            price: 59.0,
            description: None,
            features: vec!["Organic cotton".into()],
            images: vec![],
            creatives: vec![],
            url: None,
        };

        let copy = build_ad_copy(&product, "Acme");
        assert!(copy.headlines.len() >= MIN_HEADLINES);
        assert!(copy.descriptions.len() >= MIN_DESCRIPTIONS);
        assert!(copy
            .headlines
            .iter()
            .all(|h| h.chars().count() <= MAX_HEADLINE_CHARS));
        assert!(copy
            .descriptions
            .iter()
            .all(|d| d.chars().count() <= MAX_DESCRIPTION_CHARS));
        assert_eq!(copy.headlines[0], "Ultra Comfortable Organic Cott");
    }
}
