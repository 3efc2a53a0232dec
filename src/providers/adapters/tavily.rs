use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::documents::{RawRecord, SourceType};
use crate::providers::{Adapter, AdapterError, SearchOptions};

use super::map_response_status;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Tavily web search adapter.
pub struct TavilyAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TavilyAdapter {
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
}

#[async_trait]
impl Adapter for TavilyAdapter {
    fn id(&self) -> &str {
        "tavily"
    }

    fn category(&self) -> SourceType {
        SourceType::Web
    }

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": opts.max_results.max(1),
            "days": opts.days_back,
        });

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Provider {
                provider: "tavily".to_string(),
                message: e.to_string(),
            })?;

        map_response_status("tavily", response.status())?;

        let payload: Value = response.json().await.map_err(|e| AdapterError::Provider {
            provider: "tavily".to_string(),
            message: e.to_string(),
        })?;

        let results = payload
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(results
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .map(|fields| RawRecord { fields })
            .collect())
    }
}
