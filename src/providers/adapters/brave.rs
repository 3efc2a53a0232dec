use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::documents::{RawRecord, SourceType};
use crate::providers::{Adapter, AdapterError, SearchOptions};

use super::map_response_status;

const DEFAULT_BASE_URL: &str = "https://api.search.brave.com/res/v1";

/// Brave Search web adapter.
pub struct BraveAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

impl BraveAdapter {
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
impl Adapter for BraveAdapter {
    fn id(&self) -> &str {
        "brave"
    }

    fn category(&self) -> SourceType {
        SourceType::Web
    }

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<RawRecord>, AdapterError> {
        let response = self
            .client
            .get(format!("{}/web/search", self.base_url))
            .header("X-Subscription-Token", &self.api_key)
            .query(&[
                ("q", query.to_string()),
                ("count", opts.max_results.max(1).to_string()),
            ])
            .send()
            .await
            .map_err(|e| AdapterError::Provider {
                provider: "brave".to_string(),
                message: e.to_string(),
            })?;

        map_response_status("brave", response.status())?;

        let payload: Value = response.json().await.map_err(|e| AdapterError::Provider {
            provider: "brave".to_string(),
            message: e.to_string(),
        })?;

        let results = payload
            .get("web")
            .and_then(|w| w.get("results"))
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
