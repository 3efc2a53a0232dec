//! Iterative Controller: the quality-gated search/analyze loop.
//!
//! Drives an explicit state machine (`S0_Init` .. `S6_Accept` / `S_Error`)
//! over [`crate::search::SearchOrchestrator`] and [`crate::analysis::Analyzer`],
//! regenerating queries from the accumulated gap report until the document
//! set clears a quality threshold, the iteration cap is hit, or the session's
//! wall-clock budget runs out. Termination is guaranteed because every path
//! through the loop increments `iteration` and every wait is bounded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::analysis::{Analyzer, GapReport};
use crate::documents::Document;
use crate::event_bus::{AnalysisSummary, Event, EventEmitter, SessionEvent, SessionEventKind};
use crate::llm::LlmClient;
use crate::providers::{AdapterRegistry, ProviderBudgets, SearchOptions};
use crate::query::{QueryContext, QueryGenerator, Strategy};
use crate::search::SearchOrchestrator;

/// Budgets governing one controller run. Defaults match the commonly used
/// operating point; `quality_threshold` is frequently raised to 0.85 by
/// callers that want to force additional iterations.
#[derive(Clone, Debug)]
pub struct ControllerBudgets {
    pub max_iterations: u32,
    pub quality_threshold: f64,
    pub wall_time_budget: Duration,
    pub per_iteration_time_budget: Duration,
}

impl Default for ControllerBudgets {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            quality_threshold: 0.7,
            wall_time_budget: Duration::from_secs(600),
            per_iteration_time_budget: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ControllerError {
    #[error("no documents were ever gathered for \"{0}\"")]
    #[diagnostic(code(synthgraph::controller::no_documents))]
    NoDocuments(String),

    #[error("session wall-clock budget exceeded")]
    #[diagnostic(code(synthgraph::controller::budget_exceeded))]
    BudgetExceeded,

    #[error("session was cancelled")]
    #[diagnostic(code(synthgraph::controller::cancelled))]
    Cancelled,
}

/// Outcome of a controller run, handed off to the outline/writing pipeline.
#[derive(Clone, Debug)]
pub struct ControllerOutcome {
    pub documents: Vec<Document>,
    pub gap_report: GapReport,
    pub iterations: u32,
}

/// Explicit controller states, named after the state machine in the design
/// notes this module implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControllerState {
    Generate,
    Search,
    Analyze,
    Gate,
    Regenerate,
    Escalate,
    Accept,
}

/// Drives the quality-gated loop for one session.
pub struct IterativeController {
    search: SearchOrchestrator,
    llm: Arc<dyn LlmClient>,
    budgets: ControllerBudgets,
    emitter: Arc<dyn EventEmitter>,
    session_id: String,
    sequence: Arc<AtomicU64>,
}

impl IterativeController {
    /// `sequence` is shared with the caller driving this controller as part
    /// of a larger session, so `SessionEvent.sequence` stays globally ordered
    /// across every component that emits events for that session.
    #[must_use]
    pub fn new(
        registry: Arc<AdapterRegistry>,
        provider_budgets: ProviderBudgets,
        llm: Arc<dyn LlmClient>,
        budgets: ControllerBudgets,
        emitter: Arc<dyn EventEmitter>,
        session_id: impl Into<String>,
        sequence: Arc<AtomicU64>,
    ) -> Self {
        Self {
            search: SearchOrchestrator::new(registry, provider_budgets),
            llm,
            budgets,
            emitter,
            session_id: session_id.into(),
            sequence,
        }
    }

    fn emit(&self, kind: SessionEventKind) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let _ = self.emitter.emit(Event::session(SessionEvent::new(
            sequence,
            self.session_id.clone(),
            kind,
        )));
    }

    /// Run the loop for `topic` against `adapter_ids`, searching with
    /// `opts`, until acceptance or an unrecoverable error.
    pub async fn run(
        &mut self,
        topic: &str,
        adapter_ids: &[String],
        fallback_adapter_ids: &[String],
        opts: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<ControllerOutcome, ControllerError> {
        let session_start = Instant::now();
        let mut documents: Vec<Document> = Vec::new();
        let mut iteration: u32 = 0;
        let mut gap_report = GapReport {
            score: 0.0,
            missing_aspects: Vec::new(),
            weak_sources: Vec::new(),
            staleness: 0.0,
        };
        let mut state = ControllerState::Generate;
        let mut queries: Vec<String> = Vec::new();

        loop {
            if session_start.elapsed() >= self.budgets.wall_time_budget {
                self.emit(SessionEventKind::Error {
                    error_type: "TimeoutError".to_string(),
                    message: "session wall-clock budget exceeded".to_string(),
                });
                return Err(ControllerError::BudgetExceeded);
            }
            if cancel.is_cancelled() {
                return Err(ControllerError::Cancelled);
            }

            match state {
                ControllerState::Generate => {
                    self.emit(SessionEventKind::StepStarted {
                        step: "generate".to_string(),
                    });
                    let strategy = if iteration == 0 {
                        Strategy::Initial
                    } else {
                        Strategy::Iterative
                    };
                    let ctx = QueryContext {
                        section: None,
                        gap_report: if iteration == 0 {
                            None
                        } else {
                            Some(gap_report.clone())
                        },
                    };
                    queries = QueryGenerator::generate(self.llm.as_ref(), topic, strategy, &ctx)
                        .into_iter()
                        .map(|q| q.text)
                        .collect();
                    self.emit(SessionEventKind::StepCompleted {
                        step: "generate".to_string(),
                    });
                    state = ControllerState::Search;
                }

                ControllerState::Search => {
                    self.emit(SessionEventKind::StepStarted {
                        step: "search".to_string(),
                    });
                    let outcome = match timeout(
                        self.budgets.per_iteration_time_budget,
                        self.search.parallel_search(&queries, adapter_ids, opts, cancel),
                    )
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            self.emit(SessionEventKind::StepProgress {
                                step: "search".to_string(),
                                message: "iteration search timed out; treating as empty".to_string(),
                                metadata: serde_json::json!({"iteration": iteration}),
                            });
                            crate::search::SearchOutcome {
                                documents: Vec::new(),
                                failures: Vec::new(),
                            }
                        }
                    };
                    for failure in &outcome.failures {
                        self.emit(SessionEventKind::StepProgress {
                            step: "search".to_string(),
                            message: failure.error.message.clone(),
                            metadata: serde_json::json!({"tags": failure.tags}),
                        });
                    }
                    merge_documents(&mut documents, outcome.documents);
                    self.emit(SessionEventKind::StepCompleted {
                        step: "search".to_string(),
                    });

                    state = if documents.is_empty() && iteration == 0 {
                        ControllerState::Escalate
                    } else {
                        ControllerState::Analyze
                    };
                }

                ControllerState::Escalate => {
                    self.emit(SessionEventKind::StepStarted {
                        step: "escalate".to_string(),
                    });
                    let outcome = self
                        .search
                        .search_with_fallback(&queries, adapter_ids, fallback_adapter_ids, opts, cancel)
                        .await;
                    merge_documents(&mut documents, outcome.documents);
                    iteration += 1;
                    self.emit(SessionEventKind::StepCompleted {
                        step: "escalate".to_string(),
                    });
                    state = ControllerState::Analyze;
                }

                ControllerState::Analyze => {
                    self.emit(SessionEventKind::StepStarted {
                        step: "analyze".to_string(),
                    });
                    let today = chrono::Utc::now().date_naive();
                    gap_report = Analyzer::gap_report(topic, &documents, today);
                    let quality = Analyzer::aggregate_quality(topic, &documents, today);
                    self.emit(SessionEventKind::AnalysisResult {
                        summary: AnalysisSummary {
                            quality,
                            gap: gap_report.clone(),
                        },
                    });
                    self.emit(SessionEventKind::StepCompleted {
                        step: "analyze".to_string(),
                    });
                    state = ControllerState::Gate;
                }

                ControllerState::Gate => {
                    let budget_exhausted = session_start.elapsed() >= self.budgets.wall_time_budget;
                    if gap_report.score >= self.budgets.quality_threshold
                        || iteration >= self.budgets.max_iterations
                        || budget_exhausted
                    {
                        state = ControllerState::Accept;
                    } else {
                        state = ControllerState::Regenerate;
                    }
                }

                ControllerState::Regenerate => {
                    iteration += 1;
                    state = ControllerState::Generate;
                }

                ControllerState::Accept => {
                    if documents.is_empty() {
                        return Err(ControllerError::NoDocuments(topic.to_string()));
                    }
                    return Ok(ControllerOutcome {
                        documents,
                        gap_report,
                        iterations: iteration,
                    });
                }
            }
        }
    }
}

fn merge_documents(accumulated: &mut Vec<Document>, fresh: Vec<Document>) {
    let mut seen: std::collections::HashSet<String> =
        accumulated.iter().map(|d| d.url.clone()).collect();
    for doc in fresh {
        if seen.insert(doc.url.clone()) {
            accumulated.push(doc);
        }
    }
}
