//! End-to-end session scenarios, exercising [`synthgraph::session::ReportPipeline`]
//! against stub adapters rather than live providers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use synthgraph::config::{SearchConfig, SessionConfig};
use synthgraph::documents::{RawRecord, SourceType};
use synthgraph::event_bus::{Event, EventHub, SessionEventKind};
use synthgraph::llm::{LlmClient, LlmError, TemplateFallbackClient};
use synthgraph::protocol::SessionRequest;
use synthgraph::providers::{Adapter, AdapterError, AdapterRegistry, SearchOptions};
use synthgraph::session::ReportPipeline;

/// Deterministic in-memory adapter standing in for a live provider.
struct StubAdapter {
    id: &'static str,
    category: SourceType,
    records: Vec<RawRecord>,
}

#[async_trait]
impl Adapter for StubAdapter {
    fn id(&self) -> &str {
        self.id
    }

    fn category(&self) -> SourceType {
        self.category
    }

    async fn search(&self, _query: &str, _opts: &SearchOptions) -> Result<Vec<RawRecord>, AdapterError> {
        Ok(self.records.clone())
    }
}

/// Always errors, modeling a total LLM outage; every writer in this crate
/// falls back to a deterministic template on this error rather than failing.
struct AlwaysDownLlm;

impl LlmClient for AlwaysDownLlm {
    fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::CallFailed("model endpoint unreachable".to_string()))
    }
}

fn raw(url: &str, title: &str, content: &str) -> RawRecord {
    let mut fields = serde_json::Map::new();
    fields.insert("url".into(), serde_json::json!(url));
    fields.insert("title".into(), serde_json::json!(title));
    fields.insert("content".into(), serde_json::json!(content));
    RawRecord { fields }
}

fn quantum_documents() -> Vec<RawRecord> {
    vec![
        raw(
            "https://example.com/market",
            "Quantum Computing Market Outlook",
            "Market policy technology investment risk: a broad overview of the quantum computing market.",
        ),
        raw(
            "https://example.com/policy",
            "Quantum Policy Review",
            "Government policy responses to quantum computing investment and risk.",
        ),
        raw(
            "https://example.com/tech",
            "Quantum Hardware Advances",
            "Recent technology advances in qubit fidelity and error correction.",
        ),
    ]
}

fn registry_with(records: Vec<RawRecord>) -> Arc<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(StubAdapter {
        id: "arxiv",
        category: SourceType::Academic,
        records,
    }));
    Arc::new(registry)
}

fn request(task: &str, task_type: &str) -> SessionRequest {
    SessionRequest {
        task: task.to_string(),
        task_type: task_type.to_string(),
        kwargs: serde_json::Value::Null,
    }
}

/// S1: a single-iteration happy path. One adapter returns enough documents to
/// clear the quality gate on the first pass, so the controller accepts after
/// exactly one iteration and the assembled report has a populated outline,
/// one section per leaf, and de-duplicated citations in its references.
#[tokio::test]
async fn happy_path_completes_in_one_iteration_with_full_report() {
    let registry = registry_with(quantum_documents());
    let llm: Arc<dyn LlmClient> = Arc::new(TemplateFallbackClient);
    let config = SessionConfig {
        search: SearchConfig {
            max_iterations: 1,
            quality_threshold: 0.0,
            ..SearchConfig::default()
        },
        ..SessionConfig::default()
    };
    let pipeline = ReportPipeline::new(registry, llm, &config);

    let hub = EventHub::new(64);
    let mut stream = hub.subscribe();
    let cancel = CancellationToken::new();

    let outcome = pipeline
        .run("s1", &request("quantum computing", "research"), Arc::new(hub.emitter()), &cancel)
        .await
        .expect("happy path session succeeds");

    assert_eq!(outcome.report.metadata.iteration_count, 0);
    assert!(outcome.report.outline.leaf_count() >= 3);
    assert_eq!(outcome.report.sections.len(), outcome.report.outline.leaf_count());
    assert!(!outcome.report.references.is_empty());

    let mut saw_started = false;
    let mut saw_final = false;
    while let Ok(event) = stream.try_recv() {
        if let Event::Session(session) = &event {
            match &session.kind {
                SessionEventKind::SessionStarted { .. } => saw_started = true,
                SessionEventKind::Final { .. } => saw_final = true,
                _ => {}
            }
        }
    }
    assert!(saw_started);
    assert!(saw_final);
}

/// S2-inspired: with a higher quality threshold the controller needs more
/// than one iteration to accept, and the gap report that drove each
/// re-query is reflected in the final report's gap summary.
#[tokio::test]
async fn raising_the_quality_threshold_drives_additional_iterations() {
    let registry = registry_with(quantum_documents());
    let llm: Arc<dyn LlmClient> = Arc::new(TemplateFallbackClient);
    let config = SessionConfig {
        search: SearchConfig {
            max_iterations: 3,
            quality_threshold: 0.95,
            ..SearchConfig::default()
        },
        ..SessionConfig::default()
    };
    let pipeline = ReportPipeline::new(registry, llm, &config);
    let hub = EventHub::new(64);
    let cancel = CancellationToken::new();

    let outcome = pipeline
        .run("s2", &request("quantum computing", "research"), Arc::new(hub.emitter()), &cancel)
        .await
        .expect("session still accepts once the iteration cap is hit");

    assert!(outcome.report.metadata.iteration_count >= 1);
}

/// LLM-outage resilience (S4-inspired): every writer in this crate is
/// LLM-optional and falls back to a deterministic template on any
/// `LlmError`, so a session with a totally unreachable model endpoint still
/// completes and still produces full sections, rather than surfacing a
/// model error to the caller.
#[tokio::test]
async fn session_completes_via_fallback_when_the_llm_is_unreachable() {
    let registry = registry_with(quantum_documents());
    let llm: Arc<dyn LlmClient> = Arc::new(AlwaysDownLlm);
    let config = SessionConfig {
        search: SearchConfig {
            max_iterations: 1,
            quality_threshold: 0.0,
            ..SearchConfig::default()
        },
        ..SessionConfig::default()
    };
    let pipeline = ReportPipeline::new(registry, llm, &config);
    let hub = EventHub::new(64);
    let cancel = CancellationToken::new();

    let outcome = pipeline
        .run("s4", &request("quantum computing", "research"), Arc::new(hub.emitter()), &cancel)
        .await
        .expect("fallback writers keep the session from failing on LLM outage");

    assert!(!outcome.report.sections.is_empty());
    assert!(outcome.report.sections.iter().all(|s| s.word_count > 0));
}

/// S5: a token cancelled before the run starts is observed by the
/// controller on its very first loop iteration, so the session terminates
/// with a `Cancelled` error and emits a matching `Error` event rather than a
/// `Final` one.
#[tokio::test]
async fn pre_cancelled_token_terminates_the_session_as_cancelled() {
    let registry = registry_with(quantum_documents());
    let llm: Arc<dyn LlmClient> = Arc::new(TemplateFallbackClient);
    let config = SessionConfig::default();
    let pipeline = ReportPipeline::new(registry, llm, &config);

    let hub = EventHub::new(64);
    let mut stream = hub.subscribe();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = pipeline
        .run("s5", &request("quantum computing", "research"), Arc::new(hub.emitter()), &cancel)
        .await;
    assert!(result.is_err());

    let mut saw_cancelled_error = false;
    while let Ok(event) = stream.try_recv() {
        if let Event::Session(session) = &event {
            if let SessionEventKind::Error { error_type, .. } = &session.kind {
                if error_type == "Cancelled" {
                    saw_cancelled_error = true;
                }
            }
        }
    }
    assert!(saw_cancelled_error);
}

/// S6-inspired: `SessionConfig::resolve`'s documented zero-provider
/// `ConfigError` path can't be reached through `ProviderKeys` (arXiv is
/// always configured), so this exercises the equivalent degradation one
/// level down instead: an empty `AdapterRegistry` yields no documents on
/// the first iteration, which the controller maps to `NoDocuments`.
#[tokio::test]
async fn empty_registry_yields_no_documents_error() {
    let registry = Arc::new(AdapterRegistry::new());
    let llm: Arc<dyn LlmClient> = Arc::new(TemplateFallbackClient);
    let config = SessionConfig {
        search: SearchConfig {
            max_iterations: 1,
            ..SearchConfig::default()
        },
        ..SessionConfig::default()
    };
    let pipeline = ReportPipeline::new(registry, llm, &config);
    let hub = EventHub::new(64);
    let cancel = CancellationToken::new();

    let result = pipeline
        .run("s6", &request("quantum computing", "research"), Arc::new(hub.emitter()), &cancel)
        .await;

    assert!(result.is_err());
    let err = result.unwrap_err();
    assert_eq!(err.as_core_error().type_name(), "ProviderError");
}
