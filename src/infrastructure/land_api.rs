//! Portal API client for listing search and detail endpoints
//!
//! Read-only JSON API access with retry on transient failures. Authorization
//! failures surface as a typed error so the collection driver can refresh
//! the credential and retry the specific request once.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, REFERER, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::error::{CollectorError, CollectorResult};
use crate::infrastructure::config::ApiConfig;
use crate::infrastructure::credential::Credential;
use crate::infrastructure::parsing::RawListingPayload;

/// One page of search results: listing summaries plus the continuation flag.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub items: Vec<ListingSummary>,
    pub has_more: bool,
}

/// Minimal summary from the search endpoint; the detail fetch does the rest.
#[derive(Debug, Clone)]
pub struct ListingSummary {
    pub article_no: String,
    pub trade_type_code: Option<String>,
}

pub struct LandApiClient {
    client: Client,
    config: ApiConfig,
}

impl LandApiClient {
    pub fn new(config: ApiConfig) -> CollectorResult<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .gzip(true)
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch one page of listing summaries for a region.
    pub async fn search_page(
        &self,
        credential: &Credential,
        region_code: &str,
        page: u32,
    ) -> CollectorResult<SearchPage> {
        let mut url = self.endpoint("/api/articles")?;
        url.query_pairs_mut()
            .append_pair("cortarNo", region_code)
            .append_pair("order", "rank")
            .append_pair("page", &page.to_string())
            .append_key_only("articleState");
        let url = url.to_string();
        let body = self.get_json(credential, &url).await?;

        let items = body
            .get("articleList")
            .and_then(Value::as_array)
            .ok_or_else(|| CollectorError::malformed(&url, "missing articleList"))?
            .iter()
            .filter_map(|item| {
                let article_no = item
                    .get("articleNo")
                    .or_else(|| item.get("atclNo"))
                    .and_then(value_as_id)?;
                Some(ListingSummary {
                    article_no,
                    trade_type_code: item
                        .get("tradeTypeCode")
                        .or_else(|| item.get("tradTpCd"))
                        .and_then(|v| v.as_str().map(|s| s.to_string())),
                })
            })
            .collect();

        let has_more = body
            .get("isMoreData")
            .and_then(Value::as_bool)
            .or_else(|| body.get("moreDataYn").and_then(|v| v.as_str()).map(|v| v == "Y"))
            .unwrap_or(false);

        Ok(SearchPage { items, has_more })
    }

    /// Fetch the full detail payload for one listing.
    pub async fn fetch_detail(
        &self,
        credential: &Credential,
        article_no: &str,
    ) -> CollectorResult<RawListingPayload> {
        let mut url = self.endpoint(&format!("/api/articles/{article_no}"))?;
        url.query_pairs_mut().append_pair("complexNo", "");
        let url = url.to_string();
        let body = self.get_json(credential, &url).await?;
        Ok(RawListingPayload::new(body))
    }

    fn endpoint(&self, path: &str) -> CollectorResult<Url> {
        let base = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        Url::parse(&base).map_err(|e| CollectorError::Config {
            message: format!("invalid API base url: {e}"),
        })
    }

    /// GET with retry policy on transient statuses and network errors.
    /// Auth failures (401/403) never retry here - credential refresh is the
    /// driver's decision.
    async fn get_json(&self, credential: &Credential, url: &str) -> CollectorResult<Value> {
        let mut last_err: Option<CollectorError> = None;

        for attempt in 1..=self.config.max_retries {
            debug!("🌐 HTTP GET (attempt {}/{}): {}", attempt, self.config.max_retries, url);
            match self
                .client
                .get(url)
                .headers(self.auth_headers(credential)?)
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json::<Value>().await.map_err(CollectorError::from);
                    }
                    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                        warn!("🔐 auth rejected ({}) for {}", status, url);
                        return Err(CollectorError::AuthFailed { url: url.to_string() });
                    }

                    let retryable = matches!(
                        status,
                        StatusCode::REQUEST_TIMEOUT
                            | StatusCode::TOO_MANY_REQUESTS
                            | StatusCode::BAD_GATEWAY
                            | StatusCode::SERVICE_UNAVAILABLE
                            | StatusCode::GATEWAY_TIMEOUT
                            | StatusCode::INTERNAL_SERVER_ERROR
                    );
                    if retryable && attempt < self.config.max_retries {
                        // Respect Retry-After on 429/503.
                        let mut delay_secs = 2_u64.pow(attempt - 1);
                        if let Some(retry_after) = resp.headers().get(RETRY_AFTER) {
                            if let Ok(s) = retry_after.to_str() {
                                if let Ok(parsed) = s.parse::<u64>() {
                                    delay_secs = parsed.max(delay_secs);
                                }
                            }
                        }
                        warn!("HTTP {} on attempt {} for {}, retrying in {}s", status, attempt, url, delay_secs);
                        last_err = Some(CollectorError::Http {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                        sleep(Duration::from_secs(delay_secs)).await;
                        continue;
                    }
                    return Err(CollectorError::Http {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(e) => {
                    warn!("⚠️ network error on attempt {} for {}: {}", attempt, url, e);
                    last_err = Some(CollectorError::Network(e));
                    if attempt < self.config.max_retries {
                        sleep(Duration::from_secs(2_u64.pow(attempt - 1))).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| CollectorError::Http {
            status: 0,
            url: url.to_string(),
        }))
    }

    fn auth_headers(&self, credential: &Credential) -> CollectorResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", credential.bearer_token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|_| CollectorError::Config {
                message: "bearer token contains invalid header characters".to_string(),
            })?,
        );
        if !credential.cookies.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&credential.cookie_header()) {
                headers.insert(COOKIE, value);
            }
        }
        if let Ok(referer) = HeaderValue::from_str(&self.config.referer) {
            headers.insert(REFERER, referer);
        }
        Ok(headers)
    }
}

/// Article numbers arrive as strings or bare numbers depending on schema.
fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_builds_from_default_config() {
        let client = LandApiClient::new(ApiConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn endpoint_normalizes_trailing_slash() {
        let mut config = ApiConfig::default();
        config.base_url = "https://new.land.naver.com/".to_string();
        let client = LandApiClient::new(config).unwrap();
        let url = client.endpoint("/api/articles").unwrap();
        assert_eq!(url.as_str(), "https://new.land.naver.com/api/articles");
    }

    #[test]
    fn id_extraction_accepts_strings_and_numbers() {
        assert_eq!(value_as_id(&json!("2412345678")).as_deref(), Some("2412345678"));
        assert_eq!(value_as_id(&json!(2412345678u64)).as_deref(), Some("2412345678"));
        assert_eq!(value_as_id(&json!("  ")), None);
        assert_eq!(value_as_id(&json!(null)), None);
    }
}
