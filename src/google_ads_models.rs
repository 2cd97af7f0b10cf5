use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response of `customers/{manager}:createCustomerClient`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerClientResponse {
    pub resource_name: String,
}

impl CreateCustomerClientResponse {
    /// Customer id is the last segment of `customers/{id}`.
    pub fn customer_id(&self) -> Option<&str> {
        self.resource_name
            .strip_prefix("customers/")
            .filter(|id| !id.is_empty() && !id.contains('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateResult {
    pub resource_name: String,
}

/// Response of every `{service}:mutate` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateResponse {
    #[serde(default)]
    pub results: Vec<MutateResult>,
}

/// Response of `googleAds:search`; rows stay untyped since their shape follows the query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSnippet {
    #[serde(rename = "type", default)]
    pub snippet_type: Option<String>,
    #[serde(default)]
    pub page_format: Option<String>,
    #[serde(default)]
    pub global_site_tag: Option<String>,
    #[serde(default)]
    pub event_snippet: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordIdea {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordIdeasResponse {
    #[serde(default)]
    pub results: Vec<KeywordIdea>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoTargetConstant {
    pub resource_name: String,
    #[serde(default)]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoTargetConstantSuggestion {
    pub geo_target_constant: GeoTargetConstant,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestGeoTargetConstantsResponse {
    #[serde(default)]
    pub geo_target_constant_suggestions: Vec<GeoTargetConstantSuggestion>,
}

/// Converts a GAQL resource (`campaign_budget`) to its JSON row key (`campaignBudget`).
pub fn row_key(resource: &str) -> String {
    let mut key = String::with_capacity(resource.len());
    let mut upper_next = false;
    for c in resource.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            key.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            key.push(c);
        }
    }
    key
}

/// Quotes a string literal for a GAQL `WHERE` clause.
pub fn gaql_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
