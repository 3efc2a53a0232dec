use async_trait::async_trait;
use reqwest::Client;

use crate::documents::{RawRecord, SourceType};
use crate::providers::{Adapter, AdapterError, SearchOptions};

use super::map_response_status;

/// arXiv academic adapter. arXiv's API returns Atom XML; entries are
/// re-shaped into the same `RawRecord` field map the Normalizer expects
/// (`title`, `abstract`, `authors`, `publication_date`, `url`).
const DEFAULT_BASE_URL: &str = "http://export.arxiv.org/api/query";

pub struct ArxivAdapter {
    client: Client,
    base_url: String,
}

impl Default for ArxivAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArxivAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
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
impl Adapter for ArxivAdapter {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn category(&self) -> SourceType {
        SourceType::Academic
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
                ("search_query", format!("all:{query}")),
                ("max_results", opts.max_results.max(1).to_string()),
            ])
            .send()
            .await
            .map_err(|e| AdapterError::Provider {
                provider: "arxiv".to_string(),
                message: e.to_string(),
            })?;

        map_response_status("arxiv", response.status())?;

        let body = response.text().await.map_err(|e| AdapterError::Provider {
            provider: "arxiv".to_string(),
            message: e.to_string(),
        })?;

        Ok(parse_atom_entries(&body))
    }
}

/// Minimal Atom-feed entry extraction, just enough to populate the field
/// names the Normalizer looks for. Not a general-purpose XML parser.
fn parse_atom_entries(body: &str) -> Vec<RawRecord> {
    body.split("<entry>")
        .skip(1)
        .map(|chunk| {
            let entry = chunk.split("</entry>").next().unwrap_or_default();
            let mut fields = serde_json::Map::new();
            if let Some(title) = extract_tag(entry, "title") {
                fields.insert("title".to_string(), title.into());
            }
            if let Some(summary) = extract_tag(entry, "summary") {
                fields.insert("abstract".to_string(), summary.into());
            }
            if let Some(published) = extract_tag(entry, "published") {
                fields.insert("publication_date".to_string(), published.into());
            }
            if let Some(id) = extract_tag(entry, "id") {
                fields.insert("url".to_string(), id.into());
            }
            let authors: Vec<&str> = entry
                .split("<name>")
                .skip(1)
                .filter_map(|c| c.split("</name>").next())
                .collect();
            if !authors.is_empty() {
                fields.insert("authors".to_string(), authors.join(", ").into());
            }
            RawRecord { fields }
        })
        .collect()
}

fn extract_tag<'a>(haystack: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = haystack.find(&open)? + open.len();
    let end = haystack[start..].find(&close)? + start;
    Some(haystack[start..end].trim())
}
