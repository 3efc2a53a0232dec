//! Concrete provider adapters.
//!
//! Each adapter is a thin translation layer: native HTTP call in, a vector of
//! [`RawRecord`](crate::documents::RawRecord) out. None of them normalize,
//! merge, or rank — that is the orchestrator and normalizer's job.

mod arxiv;
mod brave;
mod google;
mod news;
mod tavily;

pub use arxiv::ArxivAdapter;
pub use brave::BraveAdapter;
pub use google::GoogleAdapter;
pub use news::NewsApiAdapter;
pub use tavily::TavilyAdapter;

use reqwest::StatusCode;

use super::AdapterError;

/// Shared HTTP error-status mapping: 429 becomes `RateLimited`, network/parse
/// failures become `Provider`, and the rest are passed through as-is.
fn map_response_status(provider: &str, status: StatusCode) -> Result<(), AdapterError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AdapterError::RateLimited(provider.to_string()));
    }
    if !status.is_success() {
        return Err(AdapterError::Provider {
            provider: provider.to_string(),
            message: format!("unexpected status {status}"),
        });
    }
    Ok(())
}
