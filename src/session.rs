//! End-to-end session driver: takes a [`SessionRequest`], runs query
//! generation/search/analysis (via [`IterativeController`]), outlining,
//! section/summary writing, and report assembly, and emits the full
//! `SessionStarted`..`Final` (or `Error`) event sequence along the way.
//!
//! [`ReportPipeline::run`] is the direct entry point, in the same spirit as
//! [`IterativeController::run`] itself: a self-contained async orchestrator
//! that emits its own session events rather than going through the
//! `Node`/`GraphBuilder`/scheduler substrate. [`ReportPipelineNode`] wraps
//! the same pipeline as a single [`Node`] so it can also be driven through
//! [`crate::runtimes::AppRunner`], populating the `documents`/`outline`/
//! `sections`/`quality` channels from a real session request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::analysis::Analyzer;
use crate::config::{CoreError, SessionConfig};
use crate::controller::{ControllerBudgets, ControllerError, IterativeController};
use crate::documents::Document;
use crate::event_bus::{Event, EventEmitter, SessionEvent, SessionEventKind};
use crate::llm::LlmClient;
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::outline::{OutlineBuilder, OutlineError, OutlineNode, ReportType};
use crate::protocol::SessionRequest;
use crate::providers::{AdapterRegistry, ProviderBudgets, SearchOptions};
use crate::report::{Report, ReportAssembler, ReportError, ReportMetadata};
use crate::state::StateSnapshot;
use crate::writing::{SectionConfig, SectionWriter, SummaryConstraints, SummaryFormat, SummaryWriter};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SessionError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Outline(#[from] OutlineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Report(#[from] ReportError),

    #[error("section \"{0}\" failed to write: {1}")]
    #[diagnostic(code(synthgraph::session::section_failed))]
    Section(String, String),
}

impl SessionError {
    /// Map to the externally visible §7 error taxonomy, mirroring how
    /// [`JsonRpcError::from_core_error`](crate::protocol::JsonRpcError::from_core_error)
    /// consumes it.
    #[must_use]
    pub fn as_core_error(&self) -> CoreError {
        match self {
            SessionError::Controller(ControllerError::BudgetExceeded) => {
                CoreError::TimeoutError(self.to_string())
            }
            SessionError::Controller(ControllerError::Cancelled) => CoreError::Cancelled,
            SessionError::Controller(ControllerError::NoDocuments(_)) => {
                CoreError::ProviderError(self.to_string())
            }
            SessionError::Outline(_) | SessionError::Report(_) | SessionError::Section(..) => {
                CoreError::ValidationError(self.to_string())
            }
        }
    }
}

/// Emits `SessionEvent`s under one session id with a shared, monotonically
/// increasing sequence counter. The same counter is handed to
/// [`IterativeController`] so sequence numbers stay globally ordered across
/// every component emitting events for one session, not just within this
/// pipeline's own steps.
#[derive(Clone)]
struct SessionEmitter {
    emitter: Arc<dyn EventEmitter>,
    session_id: String,
    sequence: Arc<AtomicU64>,
}

impl SessionEmitter {
    fn new(emitter: Arc<dyn EventEmitter>, session_id: impl Into<String>) -> Self {
        Self {
            emitter,
            session_id: session_id.into(),
            sequence: Arc::new(AtomicU64::new(0)),
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

    fn sequence_source(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.sequence)
    }

    fn emitter_handle(&self) -> Arc<dyn EventEmitter> {
        Arc::clone(&self.emitter)
    }
}

/// A fully assembled report plus the document set it was built from, the
/// latter not being part of [`Report`] itself.
#[derive(Clone, Debug)]
pub struct SessionOutcome {
    pub report: Report,
    pub documents: Vec<Document>,
}

/// Wires query generation, search, outlining, writing, and assembly into one
/// session for a given set of adapters/LLM/budgets. One instance can drive
/// many sessions; nothing here is session-specific except the arguments to
/// [`ReportPipeline::run`].
pub struct ReportPipeline {
    registry: Arc<AdapterRegistry>,
    provider_budgets: ProviderBudgets,
    llm: Arc<dyn LlmClient>,
    controller_budgets: ControllerBudgets,
    adapter_ids: Vec<String>,
    fallback_adapter_ids: Vec<String>,
    search_opts: SearchOptions,
    section_config: SectionConfig,
    summary_constraints: SummaryConstraints,
}

impl ReportPipeline {
    #[must_use]
    pub fn new(registry: Arc<AdapterRegistry>, llm: Arc<dyn LlmClient>, config: &SessionConfig) -> Self {
        let adapter_ids: Vec<String> = config
            .providers
            .configured_adapter_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            registry,
            provider_budgets: ProviderBudgets::default(),
            llm,
            controller_budgets: ControllerBudgets {
                max_iterations: config.search.max_iterations,
                quality_threshold: config.search.quality_threshold,
                wall_time_budget: config.wall_time_budget,
                per_iteration_time_budget: config.per_iteration_time_budget,
            },
            fallback_adapter_ids: adapter_ids.clone(),
            adapter_ids,
            search_opts: SearchOptions {
                max_results: 10,
                days_back: Some(config.search.days),
                freshness: None,
                language: Some(config.search.language.clone()),
            },
            section_config: SectionConfig {
                include_citations: config.search.include_citations,
                ..SectionConfig::default()
            },
            summary_constraints: SummaryConstraints {
                max_words: 300,
                format: SummaryFormat::Executive,
                focus_areas: Vec::new(),
                tone: None,
                audience: None,
            },
        }
    }

    /// Run one session end to end for `request`, emitting `SessionStarted`,
    /// the controller's/writer's step events, and exactly one of `Final` or
    /// `Error` via `emitter`.
    pub async fn run(
        &self,
        session_id: &str,
        request: &SessionRequest,
        emitter: Arc<dyn EventEmitter>,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, SessionError> {
        let topic = request.task.clone();
        let report_type = request.resolve_report_type();
        let session = SessionEmitter::new(emitter, session_id.to_string());

        session.emit(SessionEventKind::SessionStarted {
            topic: topic.clone(),
            report_type: report_type.as_str().to_string(),
        });

        let start = Instant::now();
        match self.run_inner(&topic, report_type, session_id, &session, cancel).await {
            Ok((mut outcome, _)) => {
                outcome.report.metadata.wall_time_ms =
                    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                let word_count: usize = outcome.report.sections.iter().map(|s| s.word_count).sum();
                let report_path =
                    ReportAssembler::filename(&topic, report_type.as_str(), outcome.report.generated_at);
                session.emit(SessionEventKind::Final { report_path, word_count });
                Ok(outcome)
            }
            Err(err) => {
                session.emit(SessionEventKind::Error {
                    error_type: err.as_core_error().type_name().to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Returns the outcome plus a duplicate of its document set, so callers
    /// that only have `&SessionOutcome` don't need a second clone at the call
    /// site (the node wrapper needs both the report and the raw documents).
    async fn run_inner(
        &self,
        topic: &str,
        report_type: ReportType,
        session_id: &str,
        session: &SessionEmitter,
        cancel: &CancellationToken,
    ) -> Result<(SessionOutcome, ()), SessionError> {
        let mut controller = IterativeController::new(
            Arc::clone(&self.registry),
            self.provider_budgets.clone(),
            Arc::clone(&self.llm),
            self.controller_budgets.clone(),
            session.emitter_handle(),
            session_id.to_string(),
            session.sequence_source(),
        );
        let outcome = controller
            .run(topic, &self.adapter_ids, &self.fallback_adapter_ids, &self.search_opts, cancel)
            .await?;

        session.emit(SessionEventKind::StepStarted { step: "outline".to_string() });
        let outline = OutlineBuilder::build_outline(topic, report_type, &outcome.documents);
        OutlineBuilder::validate(&outline)?;
        session.emit(SessionEventKind::StepCompleted { step: "outline".to_string() });

        let mut sections = Vec::with_capacity(outline.leaf_count());
        for leaf in outline.leaves() {
            let docs_for_section = Self::documents_for_leaf(leaf, &outcome.documents);
            let section = SectionWriter::write_section(self.llm.as_ref(), leaf, &docs_for_section, &self.section_config)
                .map_err(|e| SessionError::Section(leaf.title.clone(), e.to_string()))?;
            session.emit(SessionEventKind::SectionGenerated {
                outline_id: section.outline_id,
                word_count: section.word_count,
            });
            sections.push(section);
        }

        let today = chrono::Utc::now().date_naive();
        let quality_score = Analyzer::aggregate_quality(topic, &outcome.documents, today);

        session.emit(SessionEventKind::StepStarted { step: "summarize".to_string() });
        let summary_inputs: Vec<String> = sections.iter().map(|s| s.content.clone()).collect();
        let executive_summary = SummaryWriter::write_summary(self.llm.as_ref(), &summary_inputs, &self.summary_constraints);
        session.emit(SessionEventKind::StepCompleted { step: "summarize".to_string() });

        let metadata = ReportMetadata {
            session_id: session_id.to_string(),
            iteration_count: outcome.iterations,
            sources_count: outcome.documents.len(),
            model_usage_totals: HashMap::new(),
            wall_time_ms: 0,
        };

        let report = ReportAssembler::assemble(
            topic,
            outline,
            sections,
            executive_summary,
            quality_score,
            outcome.gap_report,
            metadata,
            chrono::Utc::now(),
        )?;

        Ok((
            SessionOutcome {
                report,
                documents: outcome.documents,
            },
            (),
        ))
    }

    /// Documents whose title or content mentions the leaf's title, falling
    /// back to the full document set for leaves (like "Introduction" or
    /// "Conclusion") that don't match anything specific.
    fn documents_for_leaf(leaf: &OutlineNode, docs: &[Document]) -> Vec<Document> {
        let title_lower = leaf.title.to_lowercase();
        let matched: Vec<Document> = docs
            .iter()
            .filter(|d| {
                d.title.to_lowercase().contains(&title_lower) || d.content.to_lowercase().contains(&title_lower)
            })
            .cloned()
            .collect();
        if matched.is_empty() {
            docs.to_vec()
        } else {
            matched
        }
    }
}

/// Drives [`ReportPipeline::run`] as a single workflow node, populating the
/// `documents`/`outline`/`sections`/`quality` channels from a real
/// [`SessionRequest`]. Registered through [`crate::graphs::GraphBuilder`] and
/// driven via [`crate::runtimes::AppRunner::run_until_complete`], this gives
/// the engine substrate an actual pipeline stage to execute rather than only
/// its own module-level tests.
pub struct ReportPipelineNode {
    pub pipeline: Arc<ReportPipeline>,
    pub request: SessionRequest,
    pub session_id: String,
}

#[async_trait]
impl Node for ReportPipelineNode {
    async fn run(&self, _snapshot: StateSnapshot, ctx: NodeContext) -> Result<NodePartial, NodeError> {
        let cancel = CancellationToken::new();
        let outcome = self
            .pipeline
            .run(&self.session_id, &self.request, Arc::clone(&ctx.event_emitter), &cancel)
            .await
            .map_err(|e| NodeError::Provider {
                provider: "report_pipeline",
                message: e.to_string(),
            })?;

        let rendered = ReportAssembler::render(&outcome.report);
        Ok(NodePartial::new()
            .with_documents(outcome.documents)
            .with_outline(outcome.report.outline.clone())
            .with_sections(outcome.report.sections.clone())
            .with_quality(outcome.report.quality_score, outcome.report.gap_report.clone())
            .with_messages(vec![Message::assistant(&rendered)]))
    }
}

/// Build a single-node `Start -> report_pipeline -> End` graph for `request`,
/// ready to compile and run through [`crate::runtimes::AppRunner`].
#[must_use]
pub fn build_report_graph(
    pipeline: Arc<ReportPipeline>,
    request: SessionRequest,
    session_id: impl Into<String>,
) -> crate::app::App {
    use crate::graphs::GraphBuilder;
    use crate::types::NodeKind;

    let node_kind = NodeKind::Custom("report_pipeline".to_string());
    let node = ReportPipelineNode {
        pipeline,
        request,
        session_id: session_id.into(),
    };
    GraphBuilder::new()
        .add_node(node_kind.clone(), node)
        .add_edge(NodeKind::Start, node_kind.clone())
        .add_edge(node_kind, NodeKind::End)
        .compile()
}
