//! Provider adapters: the uniform `query -> raw results` seam every external
//! retrieval source is wrapped behind.

pub mod adapters;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::Semaphore;
use tokio::time::sleep;

use crate::documents::{RawRecord, SourceType};

/// Search options translated into the provider's native call shape.
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    pub max_results: usize,
    pub days_back: Option<u32>,
    pub freshness: Option<Freshness>,
    pub language: Option<String>,
}

/// News-style freshness window. Adapters lacking native support emulate it
/// with `days_back` filtering and drop undated items when active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    PastDay,
    PastWeek,
    PastMonth,
}

impl Freshness {
    #[must_use]
    pub fn as_days(&self) -> u32 {
        match self {
            Freshness::PastDay => 1,
            Freshness::PastWeek => 7,
            Freshness::PastMonth => 30,
        }
    }
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum AdapterError {
    #[error("provider {provider} error: {message}")]
    #[diagnostic(code(synthgraph::providers::provider_error))]
    Provider { provider: String, message: String },

    #[error("provider {0} rate limited the request")]
    #[diagnostic(code(synthgraph::providers::rate_limited))]
    RateLimited(String),

    #[error("provider {0} call timed out")]
    #[diagnostic(code(synthgraph::providers::timeout))]
    Timeout(String),

    #[error("provider {0} is not configured (missing API key)")]
    #[diagnostic(code(synthgraph::providers::unconfigured))]
    Unconfigured(String),
}

/// One external retrieval source, wrapped behind a uniform interface.
///
/// Implementations must never mutate or merge results; that is the
/// orchestrator's job. Rate shaping and retry-on-`RateLimited` are the
/// adapter's responsibility via [`RateLimiter::retry_with_backoff`].
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable id, e.g. `"tavily"`.
    fn id(&self) -> &str;

    fn category(&self) -> SourceType;

    async fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<RawRecord>, AdapterError>;
}

/// Static, per-provider in-flight concurrency budgets. Caps in-flight
/// requests to a single provider across the whole session; excess tasks wait
/// on the semaphore, not the orchestrator's overall worker pool.
///
/// Cloning shares the underlying semaphores (and the lock guarding
/// lazily-created ones), so every clone enforces the same session-wide cap.
#[derive(Clone)]
pub struct ProviderBudgets {
    permits: Arc<parking_lot::RwLock<FxHashMap<String, Arc<Semaphore>>>>,
    default_cap: usize,
}

const DEFAULT_BUDGETS: &[(&str, usize)] = &[
    ("brave", 2),
    ("google", 6),
    ("tavily", 8),
    ("arxiv", 4),
    ("news", 5),
];
const DEFAULT_CAP: usize = 3;

impl Default for ProviderBudgets {
    fn default() -> Self {
        let permits = DEFAULT_BUDGETS
            .iter()
            .map(|(id, cap)| ((*id).to_string(), Arc::new(Semaphore::new(*cap))))
            .collect();
        Self {
            permits: Arc::new(parking_lot::RwLock::new(permits)),
            default_cap: DEFAULT_CAP,
        }
    }
}

impl ProviderBudgets {
    /// Acquire one in-flight slot for `provider_id`, creating a
    /// default-capacity semaphore on first use of an unknown id.
    pub async fn acquire(&self, provider_id: &str) -> tokio::sync::OwnedSemaphorePermit {
        let semaphore = {
            let existing = self.permits.read().get(provider_id).cloned();
            existing.unwrap_or_else(|| {
                self.permits
                    .write()
                    .entry(provider_id.to_string())
                    .or_insert_with(|| Arc::new(Semaphore::new(self.default_cap)))
                    .clone()
            })
        };
        semaphore
            .acquire_owned()
            .await
            .expect("provider semaphore is never closed")
    }

    #[must_use]
    pub fn cap_for(&self, provider_id: &str) -> usize {
        self.permits
            .read()
            .get(provider_id)
            .map(|s| s.available_permits())
            .unwrap_or(self.default_cap)
    }
}

/// Retry-with-backoff helper for the `RateLimited` error kind: up to 2
/// retries with exponential backoff, per §7 of the error taxonomy.
pub struct RateLimiter;

impl RateLimiter {
    pub async fn retry_with_backoff<F, Fut, T>(mut call: F) -> Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, AdapterError>>,
    {
        const MAX_RETRIES: u32 = 2;
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(AdapterError::RateLimited(provider)) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    sleep(backoff).await;
                    let _ = &provider;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

/// Registry of configured adapters, keyed by id, grouped by category.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> &mut Self {
        self.adapters.insert(adapter.id().to_string(), adapter);
        self
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(id).cloned()
    }

    #[must_use]
    pub fn by_category(&self, category: SourceType) -> Vec<Arc<dyn Adapter>> {
        self.adapters
            .values()
            .filter(|a| a.category() == category)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn Adapter>> {
        self.adapters.values().cloned().collect()
    }
}
