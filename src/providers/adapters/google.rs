use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::documents::{RawRecord, SourceType};
use crate::providers::{Adapter, AdapterError, SearchOptions};

use super::map_response_status;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Google Programmable Search Engine adapter.
pub struct GoogleAdapter {
    client: Client,
    api_key: String,
    cse_id: String,
    base_url: String,
}

impl GoogleAdapter {
    #[must_use]
    pub fn new(api_key: impl Into<String>, cse_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            cse_id: cse_id.into(),
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
impl Adapter for GoogleAdapter {
    fn id(&self) -> &str {
        "google"
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
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", query),
                ("num", &opts.max_results.clamp(1, 10).to_string()),
            ])
            .send()
            .await
            .map_err(|e| AdapterError::Provider {
                provider: "google".to_string(),
                message: e.to_string(),
            })?;

        map_response_status("google", response.status())?;

        let payload: Value = response.json().await.map_err(|e| AdapterError::Provider {
            provider: "google".to_string(),
            message: e.to_string(),
        })?;

        let results = payload
            .get("items")
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
