//! HTTP page fetcher
//!
//! This module fetches pages from a JSON API over HTTP, including:
//! - Building HTTP clients with proper user agent strings
//! - Building the per-page URL from the base URL and shared parameters
//! - Classifying HTTP and network failures
//! - Counting the items in a decoded page

use crate::config::{ApiConfig, UserAgentConfig};
use crate::fetch::{FetchError, PageFetcher, PageRequest};
use crate::PagewiseError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Upper bound on a whole request, including the body
///
/// # Example
///
/// ```no_run
/// use pagewise::config::UserAgentConfig;
/// use pagewise::fetch::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     client_name: "pagewise".to_string(),
///     client_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "ops@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    // Format: ClientName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.client_name, config.client_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages of a JSON API with one GET request per page
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    base_url: Url,
    page_param: String,
    items_field: Option<String>,
    timeout: Duration,
}

impl HttpPageFetcher {
    /// Creates a fetcher for the configured API
    pub fn new(api: &ApiConfig, user_agent: &UserAgentConfig) -> Result<Self, PagewiseError> {
        let timeout = Duration::from_millis(api.timeout_ms);
        let client = build_http_client(user_agent, timeout)?;
        let base_url = Url::parse(&api.base_url)?;

        Ok(Self {
            client,
            base_url,
            page_param: api.page_param.clone(),
            items_field: api.items_field.clone(),
            timeout,
        })
    }

    /// Builds the URL for one page request
    ///
    /// Query parameters already present on the base URL are kept; shared
    /// parameters follow them and the page parameter comes last.
    pub fn page_url(&self, request: &PageRequest) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in request.params.iter() {
                query.append_pair(key, value);
            }
            query.append_pair(&self.page_param, &request.page_number.to_string());
        }
        url
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<u64, FetchError> {
        let page = request.page_number;
        let url = self.page_url(request);
        tracing::trace!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    page,
                    timeout: self.timeout,
                }
            } else {
                FetchError::Http { page, source: e }
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited { page });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                page,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    page,
                    timeout: self.timeout,
                }
            } else {
                FetchError::Http { page, source: e }
            }
        })?;

        let value: Value = serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
            page,
            message: e.to_string(),
        })?;

        count_items(&value, self.items_field.as_deref())
            .map_err(|message| FetchError::Decode { page, message })
    }
}

/// Counts the items of a decoded page
///
/// With no field the document itself must be an array. A field may be a
/// dotted path (`data.results`) into nested objects.
pub fn count_items(value: &Value, items_field: Option<&str>) -> Result<u64, String> {
    let items = match items_field {
        None => value,
        Some(path) => path.split('.').try_fold(value, |current, key| {
            current
                .get(key)
                .ok_or_else(|| format!("missing field '{}'", key))
        })?,
    };

    items
        .as_array()
        .map(|array| array.len() as u64)
        .ok_or_else(|| match items_field {
            Some(path) => format!("field '{}' is not an array", path),
            None => "response body is not an array".to_string(),
        })
}
