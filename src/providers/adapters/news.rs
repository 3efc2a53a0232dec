use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::documents::{RawRecord, SourceType};
use crate::providers::{Adapter, AdapterError, Freshness, SearchOptions};

use super::map_response_status;

/// Generic news adapter (NewsAPI-shaped). Freshness is expressed natively via
/// the `from`/`to` window when supplied; the adapter drops undated items
/// itself only for the `days_back` emulation path, since the provider does
/// not return unpublished-date articles.
pub struct NewsApiAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";

impl NewsApiAdapter {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different host, e.g. a mock server in tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn freshness_days(opts: &SearchOptions) -> Option<u32> {
        opts.freshness.map(|f| f.as_days()).or(opts.days_back)
    }
}

#[async_trait]
impl Adapter for NewsApiAdapter {
    fn id(&self) -> &str {
        "news"
    }

    fn category(&self) -> SourceType {
        SourceType::News
    }

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let mut params = vec![
            ("q".to_string(), query.to_string()),
            ("apiKey".to_string(), self.api_key.clone()),
            ("pageSize".to_string(), opts.max_results.max(1).to_string()),
        ];
        if let Some(days) = Self::freshness_days(opts) {
            params.push(("from".to_string(), format!("-{days}d")));
        }

        let response = self
            .client
            .get(format!("{}/everything", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| AdapterError::Provider {
                provider: "news".to_string(),
                message: e.to_string(),
            })?;

        map_response_status("news", response.status())?;

        let payload: Value = response.json().await.map_err(|e| AdapterError::Provider {
            provider: "news".to_string(),
            message: e.to_string(),
        })?;

        let results = payload
            .get("articles")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let freshness_active = opts.freshness.is_some();
        Ok(results
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .filter(|fields| !freshness_active || fields.contains_key("publishedAt"))
            .map(|mut fields| {
                if let Some(published) = fields.remove("publishedAt") {
                    fields.insert("published".to_string(), published);
                }
                RawRecord { fields }
            })
            .collect())
    }
}
