use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::GoogleAdsConfig;
use crate::errors::AppError;
use crate::google_ads_models::{
    gaql_string, row_key, CreateCustomerClientResponse, KeywordIdeasResponse, MutateResponse,
    SearchResponse, SuggestGeoTargetConstantsResponse, TagSnippet,
};
use crate::planning::{AdCopy, KeywordMatchType};

/// Keyword ideas kept per campaign.
const MAX_KEYWORD_IDEAS: usize = 50;

/// English, used for keyword ideas and geo suggestions.
const LANGUAGE_CONSTANT: &str = "languageConstants/1000";

/// Google Ads REST API client.
#[derive(Clone)]
pub struct GoogleAdsClient {
    client: reqwest::Client,
    base_url: String,
    developer_token: String,
    access_token: String,
    manager_customer_id: String,
}

impl GoogleAdsClient {
    pub fn new(config: &GoogleAdsConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Google Ads client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            developer_token: config.developer_token.clone(),
            access_token: config.access_token.clone(),
            manager_customer_id: config.manager_customer_id.clone(),
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, AppError> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!("Google Ads POST {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("developer-token", &self.developer_token)
            .header("login-customer-id", &self.manager_customer_id)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Google Ads request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Google Ads returned error {} on {}: {}", status, path, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Google Ads returned {} on {}: {}",
                status, path, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Google Ads response: {}", e))
        })
    }

    async fn mutate(
        &self,
        customer_id: &str,
        service: &str,
        operations: Vec<Value>,
    ) -> Result<Vec<String>, AppError> {
        let response: MutateResponse = self
            .post(
                &format!("customers/{}/{}:mutate", customer_id, service),
                &json!({ "operations": operations }),
            )
            .await?;

        Ok(response
            .results
            .into_iter()
            .map(|r| r.resource_name)
            .collect())
    }

    async fn mutate_one(
        &self,
        customer_id: &str,
        service: &str,
        operation: Value,
    ) -> Result<String, AppError> {
        self.mutate(customer_id, service, vec![operation])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppError::ExternalApiError(format!("Google Ads {} mutate returned no result", service))
            })
    }

    /// Runs a GAQL query and returns the raw result rows.
    pub async fn search(&self, customer_id: &str, query: &str) -> Result<Vec<Value>, AppError> {
        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut body = json!({ "query": query });
            if let Some(token) = &page_token {
                body["pageToken"] = json!(token);
            }

            let page: SearchResponse = self
                .post(&format!("customers/{}/googleAds:search", customer_id), &body)
                .await?;
            rows.extend(page.results);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(rows)
    }

    /// Finds a non-removed resource by its name field.
    ///
    /// `resource` is the GAQL resource (`campaign_budget`), `name_field` the full
    /// field path (`campaign_budget.name`).
    pub async fn find_resource_by_name(
        &self,
        customer_id: &str,
        resource: &str,
        name_field: &str,
        name: &str,
    ) -> Result<Option<String>, AppError> {
        let query = format!(
            "SELECT {res}.resource_name FROM {res} WHERE {field} = {name} AND {res}.status != 'REMOVED' LIMIT 1",
            res = resource,
            field = name_field,
            name = gaql_string(name)
        );

        let rows = self.search(customer_id, &query).await?;
        let key = row_key(resource);

        Ok(rows.iter().find_map(|row| {
            row.get(&key)
                .and_then(|r| r.get("resourceName"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        }))
    }

    /// Creates a client account under the manager account and returns its id.
    pub async fn create_customer_client(
        &self,
        descriptive_name: &str,
        currency_code: &str,
        time_zone: &str,
    ) -> Result<String, AppError> {
        let response: CreateCustomerClientResponse = self
            .post(
                &format!("customers/{}:createCustomerClient", self.manager_customer_id),
                &json!({
                    "customerClient": {
                        "descriptiveName": descriptive_name,
                        "currencyCode": currency_code,
                        "timeZone": time_zone,
                    }
                }),
            )
            .await?;

        let customer_id = response.customer_id().map(str::to_string).ok_or_else(|| {
            AppError::ExternalApiError(format!(
                "Unexpected customer resource name: {}",
                response.resource_name
            ))
        })?;

        tracing::info!("✓ Google Ads customer created: {}", customer_id);
        Ok(customer_id)
    }

    pub async fn create_conversion_action(
        &self,
        customer_id: &str,
        name: &str,
    ) -> Result<String, AppError> {
        self.mutate_one(
            customer_id,
            "conversionActions",
            json!({
                "create": {
                    "name": name,
                    "type": "WEBPAGE",
                    "category": "PURCHASE",
                    "status": "ENABLED",
                }
            }),
        )
        .await
    }

    pub async fn get_tag_snippets(
        &self,
        customer_id: &str,
        conversion_action: &str,
    ) -> Result<Vec<TagSnippet>, AppError> {
        let query = format!(
            "SELECT conversion_action.tag_snippets FROM conversion_action WHERE conversion_action.resource_name = {}",
            gaql_string(conversion_action)
        );

        let rows = self.search(customer_id, &query).await?;
        let snippets = rows
            .into_iter()
            .filter_map(|row| row.get("conversionAction")?.get("tagSnippets").cloned())
            .filter_map(|v| serde_json::from_value::<Vec<TagSnippet>>(v).ok())
            .flatten()
            .collect();

        Ok(snippets)
    }

    pub async fn create_campaign_budget(
        &self,
        customer_id: &str,
        name: &str,
        amount_micros: i64,
    ) -> Result<String, AppError> {
        self.mutate_one(
            customer_id,
            "campaignBudgets",
            json!({
                "create": {
                    "name": name,
                    "amountMicros": amount_micros.to_string(),
                    "deliveryMethod": "STANDARD",
                    "explicitlyShared": true,
                }
            }),
        )
        .await
    }

    pub async fn create_bidding_strategy(
        &self,
        customer_id: &str,
        name: &str,
        target_roas: f64,
        cpc_floor_micros: i64,
        cpc_ceiling_micros: i64,
    ) -> Result<String, AppError> {
        self.mutate_one(
            customer_id,
            "biddingStrategies",
            json!({
                "create": {
                    "name": name,
                    "targetRoas": {
                        "targetRoas": target_roas,
                        "cpcBidFloorMicros": cpc_floor_micros.to_string(),
                        "cpcBidCeilingMicros": cpc_ceiling_micros.to_string(),
                    }
                }
            }),
        )
        .await
    }

    pub async fn create_campaign(
        &self,
        customer_id: &str,
        name: &str,
        budget: &str,
        bidding_strategy: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, AppError> {
        self.mutate_one(
            customer_id,
            "campaigns",
            json!({
                "create": {
                    "name": name,
                    "status": "ENABLED",
                    "advertisingChannelType": "SEARCH",
                    "campaignBudget": budget,
                    "biddingStrategy": bidding_strategy,
                    "startDate": start.format("%Y-%m-%d").to_string(),
                    "endDate": end.format("%Y-%m-%d").to_string(),
                    "networkSettings": {
                        "targetGoogleSearch": true,
                        "targetSearchNetwork": true,
                        "targetContentNetwork": false,
                    }
                }
            }),
        )
        .await
    }

    pub async fn create_ad_group(
        &self,
        customer_id: &str,
        campaign: &str,
        name: &str,
    ) -> Result<String, AppError> {
        self.mutate_one(
            customer_id,
            "adGroups",
            json!({
                "create": {
                    "name": name,
                    "campaign": campaign,
                    "status": "ENABLED",
                    "type": "SEARCH_STANDARD",
                }
            }),
        )
        .await
    }

    pub async fn create_ad_group_ad(
        &self,
        customer_id: &str,
        ad_group: &str,
        name: &str,
        copy: &AdCopy,
        final_url: &str,
    ) -> Result<String, AppError> {
        let headlines: Vec<Value> = copy.headlines.iter().map(|t| json!({ "text": t })).collect();
        let descriptions: Vec<Value> = copy
            .descriptions
            .iter()
            .map(|t| json!({ "text": t }))
            .collect();

        self.mutate_one(
            customer_id,
            "adGroupAds",
            json!({
                "create": {
                    "adGroup": ad_group,
                    "status": "ENABLED",
                    "ad": {
                        "name": name,
                        "finalUrls": [final_url],
                        "responsiveSearchAd": {
                            "headlines": headlines,
                            "descriptions": descriptions,
                        }
                    }
                }
            }),
        )
        .await
    }

    /// Adds each keyword to the ad group once per match type.
    pub async fn add_keywords(
        &self,
        customer_id: &str,
        ad_group: &str,
        keywords: &[String],
    ) -> Result<Vec<String>, AppError> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let operations: Vec<Value> = keywords
            .iter()
            .flat_map(|text| {
                KeywordMatchType::VARIANTS.into_iter().map(move |match_type| {
                    json!({
                        "create": {
                            "adGroup": ad_group,
                            "status": "ENABLED",
                            "keyword": { "text": text, "matchType": match_type.as_str() }
                        }
                    })
                })
            })
            .collect();

        self.mutate(customer_id, "adGroupCriteria", operations).await
    }

    pub async fn generate_keyword_ideas(
        &self,
        customer_id: &str,
        url: &str,
    ) -> Result<Vec<String>, AppError> {
        let response: KeywordIdeasResponse = self
            .post(
                &format!("customers/{}:generateKeywordIdeas", customer_id),
                &json!({
                    "language": LANGUAGE_CONSTANT,
                    "keywordPlanNetwork": "GOOGLE_SEARCH",
                    "urlSeed": { "url": url },
                }),
            )
            .await?;

        let mut keywords: Vec<String> = Vec::new();
        for idea in response.results {
            let text = idea.text.trim().to_lowercase();
            if !text.is_empty() && !keywords.contains(&text) {
                keywords.push(text);
            }
            if keywords.len() >= MAX_KEYWORD_IDEAS {
                break;
            }
        }
        Ok(keywords)
    }

    /// Resolves location names inside one country to geo target constants.
    ///
    /// With no names, the country itself is targeted.
    pub async fn geo_targets_for_country(
        &self,
        customer_id: &str,
        country_code: &str,
        names: &[String],
    ) -> Result<Vec<String>, AppError> {
        if names.is_empty() {
            let query = format!(
                "SELECT geo_target_constant.resource_name FROM geo_target_constant \
                 WHERE geo_target_constant.country_code = {} \
                 AND geo_target_constant.target_type = 'Country'",
                gaql_string(country_code)
            );
            let rows = self.search(customer_id, &query).await?;
            return Ok(rows
                .iter()
                .filter_map(|row| {
                    row.get("geoTargetConstant")?
                        .get("resourceName")?
                        .as_str()
                        .map(str::to_string)
                })
                .collect());
        }

        let response: SuggestGeoTargetConstantsResponse = self
            .post(
                "geoTargetConstants:suggest",
                &json!({
                    "locale": "en",
                    "countryCode": country_code,
                    "locationNames": { "names": names },
                }),
            )
            .await?;

        let mut targets: Vec<String> = Vec::new();
        for suggestion in response.geo_target_constant_suggestions {
            let constant = suggestion.geo_target_constant;
            let same_country = constant
                .country_code
                .as_deref()
                .map_or(true, |c| c.eq_ignore_ascii_case(country_code));
            if same_country && !targets.contains(&constant.resource_name) {
                targets.push(constant.resource_name);
            }
        }
        Ok(targets)
    }

    pub async fn add_location_targets(
        &self,
        customer_id: &str,
        campaign: &str,
        geo_targets: &[String],
    ) -> Result<Vec<String>, AppError> {
        if geo_targets.is_empty() {
            return Ok(Vec::new());
        }

        let operations = geo_targets
            .iter()
            .map(|geo| {
                json!({
                    "create": {
                        "campaign": campaign,
                        "location": { "geoTargetConstant": geo }
                    }
                })
            })
            .collect();

        self.mutate(customer_id, "campaignCriteria", operations).await
    }

    /// Sets a campaign's serving status (`ENABLED` or `PAUSED`).
    pub async fn set_campaign_status(
        &self,
        customer_id: &str,
        campaign: &str,
        status: &str,
    ) -> Result<(), AppError> {
        self.mutate_one(
            customer_id,
            "campaigns",
            json!({
                "update": { "resourceName": campaign, "status": status },
                "updateMask": "status",
            }),
        )
        .await?;

        tracing::info!("✓ Google Ads campaign {} set to {}", campaign, status);
        Ok(())
    }

    pub async fn campaign_metrics(
        &self,
        customer_id: &str,
        campaign: &str,
    ) -> Result<Value, AppError> {
        let query = format!(
            "SELECT campaign.status, metrics.impressions, metrics.clicks, metrics.cost_micros, \
             metrics.conversions, metrics.conversions_value FROM campaign \
             WHERE campaign.resource_name = {}",
            gaql_string(campaign)
        );

        let rows = self.search(customer_id, &query).await?;
        Ok(rows.into_iter().next().unwrap_or(Value::Null))
    }
}
