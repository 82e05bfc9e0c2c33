//! REST client for the hosted backend's PostgREST endpoint.
//!
//! Tables live under `{base_url}/rest/v1/{table}`. Every request carries the
//! project's `apikey` header plus a bearer token (the user's access token when
//! signed in, otherwise the anon key).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use super::query::{Filter, Page, Query};
use super::{ApiError, RemoteClient};

// ============================================================================
// Constants
// ============================================================================

/// Path prefix of the PostgREST API on the hosted backend.
const REST_PATH: &str = "rest/v1";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// REST client for the backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: Arc<str>,
    anon_key: Arc<str>,
    token: Option<Arc<str>>,
}

impl RestClient {
    /// Create a new client for the backend at `base_url`
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            anon_key: Arc::from(anon_key),
            token: None,
        })
    }

    /// Create a client acting as a signed-in user, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<Arc<str>>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            anon_key: Arc::clone(&self.anon_key),
            token: Some(token.into()),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, REST_PATH, table)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let bearer = self.token.as_deref().unwrap_or(&*self.anon_key);
        let mut headers = header::HeaderMap::new();
        headers.insert("apikey", header_value(&self.anon_key)?);
        headers.insert(header::AUTHORIZATION, header_value(&format!("Bearer {}", bearer))?);
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn send<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().headers(self.auth_headers()?).send().await?;

            if response.status().as_u16() != 429 {
                return Self::check_response(response).await;
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }

    async fn json_rows(response: Response) -> Result<Vec<Value>, ApiError> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Expected a JSON array: {}", e)))
    }
}

fn header_value(value: &str) -> Result<header::HeaderValue, ApiError> {
    header::HeaderValue::from_str(value)
        .map_err(|e| ApiError::InvalidResponse(format!("Invalid header value: {}", e)))
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_param).collect()
}

/// Parse the total out of a `Content-Range` header (`0-5/42` or `*/0`).
pub fn parse_content_range_total(value: &str) -> Option<usize> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[async_trait]
impl RemoteClient for RestClient {
    async fn query(&self, query: &Query) -> Result<Page, ApiError> {
        let url = self.table_url(&query.table);
        let params = query.to_params();
        debug!(table = %query.table, ?params, "Querying table");

        let response = self
            .send(|| {
                let req = self.client.get(&url).query(&params);
                if query.count {
                    req.header("Prefer", "count=exact")
                } else {
                    req
                }
            })
            .await?;

        let total = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .filter(|_| query.count);

        let rows = Self::json_rows(response).await?;
        Ok(Page { rows, total })
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, ApiError> {
        let url = self.table_url(table);
        let response = self
            .send(|| {
                self.client
                    .post(&url)
                    .header("Prefer", "return=representation")
                    .json(&row)
            })
            .await?;

        Self::json_rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::InvalidResponse(format!("Insert into {} returned no row", table)))
    }

    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<Vec<Value>, ApiError> {
        let url = self.table_url(table);
        let params = filter_params(filters);
        let response = self
            .send(|| {
                self.client
                    .patch(&url)
                    .query(&params)
                    .header("Prefer", "return=representation")
                    .json(&patch)
            })
            .await?;

        Self::json_rows(response).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize, ApiError> {
        let url = self.table_url(table);
        let params = filter_params(filters);
        let response = self
            .send(|| {
                self.client
                    .delete(&url)
                    .query(&params)
                    .header("Prefer", "return=representation")
            })
            .await?;

        Ok(Self::json_rows(response).await?.len())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-5/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-5/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let client = RestClient::new("https://project.example.co/", "anon").unwrap();
        assert_eq!(
            client.table_url("tutorials"),
            "https://project.example.co/rest/v1/tutorials"
        );
    }

    #[test]
    fn test_auth_headers_prefer_user_token() {
        let client = RestClient::new("https://project.example.co", "anon").unwrap();
        let headers = client.auth_headers().unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer anon");

        let signed_in = client.with_token("user-jwt");
        let headers = signed_in.auth_headers().unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer user-jwt");
        assert_eq!(headers.get("apikey").unwrap(), "anon");
    }
}
