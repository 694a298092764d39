use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{FetchFailure, Result, SyncError};
use crate::model::{ProductBatch, SyncTimestamp};

pub mod model;
pub mod retry;

use retry::{with_retry, RetryPolicy, Sleeper, TokioSleeper};

/// Reference page size of the products endpoint.
pub const DEFAULT_PAGE_SIZE: u32 = 250;

/// Query against the remote products endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductFilter {
    ModifiedSince(SyncTimestamp),
    IdGreaterThan(i64),
}

impl ProductFilter {
    pub fn where_clause(&self) -> String {
        match self {
            ProductFilter::ModifiedSince(ts) => format!("ModifiedDate > '{}'", ts),
            ProductFilter::IdGreaterThan(id) => format!("id > {}", id),
        }
    }
}

/// Source of remote catalog records. Implemented by `RemoteCatalogClient`
/// and by fakes in tests.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_products(&self, filter: &ProductFilter) -> Result<ProductBatch>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page_size: u32,
    pub paginate: bool,
    pub max_pages: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            paginate: true,
            max_pages: 100,
        }
    }
}

#[derive(Clone)]
pub struct RemoteCatalogClient {
    http: Client,
    base_url: Url,
    username: String,
    api_key: String,
    paging: Paging,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RemoteCatalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCatalogClient")
            .field("base_url", &self.base_url.as_str())
            .field("paging", &self.paging)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RemoteCatalogClient {
    pub fn new(
        base_url: &str,
        username: String,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self> {
        // `Url::join` drops the last path segment unless the base ends in '/'.
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
        let http = Client::builder()
            .user_agent(concat!("catalog-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(SyncError::HttpClient)?;
        Ok(Self {
            http,
            base_url,
            username,
            api_key,
            paging: Paging::default(),
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let remote = &cfg.remote;
        Ok(Self::new(
            &remote.base_url,
            remote.api_username.clone(),
            remote.api_key.clone(),
            Duration::from_secs(remote.timeout_secs),
        )?
        .with_paging(Paging {
            page_size: remote.page_size,
            paginate: remote.paginate,
            max_pages: remote.max_pages,
        })
        .with_retry(RetryPolicy::from(&cfg.retry)))
    }

    pub fn with_paging(mut self, paging: Paging) -> Self {
        self.paging = paging;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn products_url(&self, filter: &ProductFilter, page: u32) -> Result<Url> {
        let mut url = self
            .base_url
            .join("v1/Products")
            .map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("rows", &self.paging.page_size.to_string())
            .append_pair("where", &filter.where_clause())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    pub fn build_request(&self, url: Url) -> reqwest::Result<reqwest::Request> {
        self.http
            .get(url)
            .basic_auth(&self.username, Some(&self.api_key))
            .header("Accept", "application/json")
            .build()
    }

    async fn attempt(&self, url: &Url) -> std::result::Result<String, FetchFailure> {
        let request = self.build_request(url.clone())?;
        let res = self.http.execute(request).await?;
        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchFailure::RateLimited);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(FetchFailure::Status { status, body });
        }
        Ok(res.text().await?)
    }

    /// GET `url` under the retry policy and decode the body as JSON.
    pub async fn fetch(&self, url: &Url) -> Result<Value> {
        let body = with_retry(&self.retry, self.sleeper.as_ref(), url.as_str(), || {
            self.attempt(url)
        })
        .await?;
        serde_json::from_str(&body).map_err(|source| SyncError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn fetch_page(&self, filter: &ProductFilter, page: u32) -> Result<Vec<Value>> {
        let url = self.products_url(filter, page)?;
        debug!(%url, "fetching product page");
        match self.fetch(&url).await? {
            Value::Array(items) => Ok(items),
            other => Err(SyncError::Decode {
                url: url.to_string(),
                source: <serde_json::Error as serde::de::Error>::custom(format!(
                    "expected a JSON array, got {}",
                    json_kind(&other)
                )),
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl CatalogSource for RemoteCatalogClient {
    async fn fetch_products(&self, filter: &ProductFilter) -> Result<ProductBatch> {
        let page_size = self.paging.page_size as usize;
        let mut batch = ProductBatch::default();
        let mut seen = 0usize;
        let mut page = 1u32;
        loop {
            let items = self.fetch_page(filter, page).await?;
            let count = items.len();
            batch.extend(model::parse_products(items, seen));
            seen += count;

            if !self.paging.paginate || count < page_size {
                break;
            }
            if self.paging.max_pages != 0 && page >= self.paging.max_pages {
                warn!(
                    filter = %filter.where_clause(),
                    pages = page,
                    rows = seen,
                    "page limit reached; remaining rows were not fetched"
                );
                break;
            }
            page += 1;
        }
        info!(
            filter = %filter.where_clause(),
            pages = page,
            rows = seen,
            rejected = batch.rejected.len(),
            "fetched products"
        );
        Ok(batch)
    }
}
