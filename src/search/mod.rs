//! Fans queries across adapters with bounded concurrency, deduplicates and
//! orders the merged result set.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::analysis::Analyzer;
use crate::channels::errors::{ErrorEvent, LadderError};
use crate::documents::{Document, Normalizer, SourceType};
use crate::providers::{Adapter, AdapterError, AdapterRegistry, ProviderBudgets, SearchOptions};

/// Default overall worker cap for `ParallelSearch`, shared across every
/// provider in the Cartesian product of queries x sources.
pub const DEFAULT_WORKER_CAP: usize = 6;

/// One search task's outcome: either documents, or a non-fatal failure that
/// the orchestrator records but does not propagate.
pub struct SearchOutcome {
    pub documents: Vec<Document>,
    /// Non-fatal per-task failures, surfaced as `StepProgress` with metadata
    /// by the caller (not by this module, which has no event-bus handle).
    pub failures: Vec<ErrorEvent>,
}

/// Fans a set of queries across a set of adapters with bounded concurrency.
pub struct SearchOrchestrator {
    registry: Arc<AdapterRegistry>,
    budgets: ProviderBudgets,
    worker_cap: usize,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new(registry: Arc<AdapterRegistry>, budgets: ProviderBudgets) -> Self {
        Self {
            registry,
            budgets,
            worker_cap: DEFAULT_WORKER_CAP,
        }
    }

    #[must_use]
    pub fn with_worker_cap(mut self, cap: usize) -> Self {
        self.worker_cap = cap;
        self
    }

    /// `ParallelSearch`: runs every `(query, adapter)` pair, deduplicating by
    /// URL (first-wins) and ordering by `(score desc, publish_date desc)`,
    /// undated documents sorting after dated ones at equal score.
    pub async fn parallel_search(
        &mut self,
        queries: &[String],
        adapter_ids: &[String],
        opts: &SearchOptions,
        cancel: &CancellationToken,
    ) -> SearchOutcome {
        if queries.is_empty() || adapter_ids.is_empty() {
            return SearchOutcome {
                documents: Vec::new(),
                failures: Vec::new(),
            };
        }

        let adapters: Vec<Arc<dyn Adapter>> = adapter_ids
            .iter()
            .filter_map(|id| self.registry.get(id))
            .collect();

        let overall = Arc::new(Semaphore::new(self.worker_cap.max(1)));
        let mut handles = Vec::with_capacity(queries.len() * adapters.len());

        for query in queries {
            for adapter in &adapters {
                let overall = overall.clone();
                let provider_permit_owner = adapter.id().to_string();
                let adapter = adapter.clone();
                let query = query.clone();
                let opts = opts.clone();
                let cancel = cancel.clone();
                let budgets = self.budgets.clone();

                handles.push(tokio::spawn(async move {
                    let overall_permit = tokio::select! {
                        permit = overall.acquire_owned() => permit.ok(),
                        () = cancel.cancelled() => None,
                    };
                    let Some(_overall_permit) = overall_permit else {
                        return Err((provider_permit_owner, AdapterError::Provider {
                            provider: adapter.id().to_string(),
                            message: "cancelled before a worker slot was available".into(),
                        }));
                    };

                    let _provider_permit = budgets.acquire(adapter.id()).await;
                    tokio::select! {
                        result = adapter.search(&query, &opts) => result.map_err(|e| (adapter.id().to_string(), e)),
                        () = cancel.cancelled() => Err((adapter.id().to_string(), AdapterError::Timeout(adapter.id().to_string()))),
                    }
                }));
            }
        }

        let mut seen = std::collections::HashSet::new();
        let mut documents = Vec::new();
        let mut failures = Vec::new();

        for (idx, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(Ok(raw_records)) => {
                    let adapter = &adapters[idx % adapters.len().max(1)];
                    let adapter_id = adapter.id().to_string();
                    let category = adapter.category();
                    for raw in &raw_records {
                        if let Some(doc) = Normalizer::normalize(&adapter_id, category, raw) {
                            if seen.insert(doc.url.clone()) {
                                documents.push(doc);
                            }
                        }
                    }
                }
                Ok(Err((provider, err))) => {
                    failures.push(
                        ErrorEvent::scheduler(0, LadderError::msg(err.to_string()))
                            .with_tag("provider")
                            .with_tag(provider),
                    );
                }
                Err(join_err) => {
                    failures.push(ErrorEvent::scheduler(
                        0,
                        LadderError::msg(format!("search task panicked: {join_err}")),
                    ));
                }
            }
        }

        Self::sort_documents(&mut documents);
        SearchOutcome { documents, failures }
    }

    /// `SearchByCategory`: restrict adapters to those registered under `category`.
    pub async fn search_by_category(
        &mut self,
        queries: &[String],
        category: SourceType,
        opts: &SearchOptions,
        cancel: &CancellationToken,
    ) -> SearchOutcome {
        let ids: Vec<String> = self
            .registry
            .by_category(category)
            .iter()
            .map(|a| a.id().to_string())
            .collect();
        self.parallel_search(queries, &ids, opts, cancel).await
    }

    /// `SearchWithFallback`: run `preferred` first; if the result count is
    /// below half of `queries.len() * opts.max_results`, also run `fallback`
    /// and merge (dedup preserved).
    pub async fn search_with_fallback(
        &mut self,
        queries: &[String],
        preferred: &[String],
        fallback: &[String],
        opts: &SearchOptions,
        cancel: &CancellationToken,
    ) -> SearchOutcome {
        let mut outcome = self.parallel_search(queries, preferred, opts, cancel).await;
        let threshold = (queries.len() * opts.max_results.max(1)) / 2;
        if outcome.documents.len() < threshold {
            let mut fallback_outcome =
                self.parallel_search(queries, fallback, opts, cancel).await;
            let mut seen: std::collections::HashSet<String> =
                outcome.documents.iter().map(|d| d.url.clone()).collect();
            fallback_outcome
                .documents
                .retain(|d| seen.insert(d.url.clone()));
            outcome.documents.extend(fallback_outcome.documents);
            outcome.failures.extend(fallback_outcome.failures);
            Self::sort_documents(&mut outcome.documents);
        }
        outcome
    }

    fn sort_documents(documents: &mut [Document]) {
        documents.sort_by(|a, b| match (a.score, b.score) {
            (Some(sa), Some(sb)) => sb
                .partial_cmp(&sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| Self::compare_dates(a, b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Self::compare_dates(a, b),
        });
    }

    fn compare_dates(a: &Document, b: &Document) -> Ordering {
        match (a.publish_date, b.publish_date) {
            (Some(da), Some(db)) => db.cmp(&da),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Quality threshold convenience, reused by the Iterative Controller when
/// deciding whether the accumulated set clears the gate.
#[must_use]
pub fn meets_quality_threshold(topic: &str, docs: &[Document], threshold: f64) -> bool {
    let today = chrono::Utc::now().date_naive();
    Analyzer::quality_score(topic, docs, today) >= threshold
}
