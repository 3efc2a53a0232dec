use std::fmt;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::analysis::{GapReport, QualityScore};
use crate::llm::UsageRecord;

pub const STREAM_END_SCOPE: &str = "__synthgraph_stream_end__";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Event {
    Node(NodeEvent),
    Diagnostic(DiagnosticEvent),
    LLM(LLMStreamingEvent),
    /// A session-scoped orchestration event (see [`SessionEvent`]).
    Session(Box<SessionEvent>),
}

impl Event {
    pub fn node_message(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Node(NodeEvent::new(None, None, scope.into(), message.into()))
    }

    pub fn node_message_with_meta(
        node_id: impl Into<String>,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Node(NodeEvent::new(
            Some(node_id.into()),
            Some(step),
            scope.into(),
            message.into(),
        ))
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    /// Wrap a [`SessionEvent`] for publication on the bus.
    pub fn session(event: SessionEvent) -> Self {
        Event::Session(Box::new(event))
    }

    pub fn scope_label(&self) -> Option<&str> {
        match self {
            Event::Node(node) => Some(node.scope()),
            Event::Diagnostic(diag) => Some(diag.scope()),
            Event::LLM(llm) => Some(llm.scope().as_ref()),
            Event::Session(session) => Some(session.kind.label()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Event::Node(node) => node.message(),
            Event::Diagnostic(diag) => diag.message(),
            Event::LLM(llm) => llm.chunk(),
            Event::Session(session) => session.kind.message(),
        }
    }

    /// Convert event to structured JSON value with normalized schema.
    ///
    /// Returns a JSON object with the following structure:
    /// ```json
    /// {
    ///   "type": "node" | "diagnostic" | "llm",
    ///   "scope": "scope_label",
    ///   "message": "event_message",
    ///   "timestamp": "2025-11-03T12:34:56.789Z",
    ///   "metadata": { /* variant-specific fields */ }
    /// }
    /// ```
    ///
    /// # Example
    ///
    /// ```
    /// use synthgraph::event_bus::Event;
    ///
    /// let event = Event::node_message_with_meta("router", 5, "routing", "Processing request");
    /// let json = event.to_json_value();
    ///
    /// assert_eq!(json["type"], "node");
    /// assert_eq!(json["scope"], "routing");
    /// assert_eq!(json["message"], "Processing request");
    /// assert_eq!(json["metadata"]["node_id"], "router");
    /// assert_eq!(json["metadata"]["step"], 5);
    /// ```
    pub fn to_json_value(&self) -> serde_json::Value {
        let (event_type, metadata) = match self {
            Event::Node(node) => {
                let mut meta = serde_json::Map::new();
                if let Some(node_id) = node.node_id() {
                    meta.insert("node_id".to_string(), json!(node_id));
                }
                if let Some(step) = node.step() {
                    meta.insert("step".to_string(), json!(step));
                }
                ("node", Value::Object(meta))
            }
            Event::Diagnostic(_) => {
                let meta = serde_json::Map::new();
                ("diagnostic", Value::Object(meta))
            }
            Event::LLM(llm) => {
                let mut meta = serde_json::Map::new();
                if let Some(session_id) = llm.session_id() {
                    meta.insert("session_id".to_string(), json!(session_id));
                }
                if let Some(node_id) = llm.node_id() {
                    meta.insert("node_id".to_string(), json!(node_id));
                }
                if let Some(stream_id) = llm.stream_id() {
                    meta.insert("stream_id".to_string(), json!(stream_id));
                }
                meta.insert("is_final".to_string(), json!(llm.is_final()));

                // Include LLM metadata fields
                for (key, value) in llm.metadata() {
                    meta.insert(key.clone(), value.clone());
                }

                ("llm", Value::Object(meta))
            }
            Event::Session(session) => {
                let mut meta = serde_json::Map::new();
                meta.insert("sequence".to_string(), json!(session.sequence));
                meta.insert("session_id".to_string(), json!(session.session_id));
                meta.insert("payload".to_string(), session.kind.to_json_value());
                ("session", Value::Object(meta))
            }
        };

        let timestamp = match self {
            Event::LLM(llm) => llm.timestamp(),
            Event::Session(session) => session.timestamp,
            _ => Utc::now(),
        };

        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "timestamp": timestamp.to_rfc3339(),
            "metadata": metadata,
        })
    }

    /// Convert event to compact JSON string representation.
    ///
    /// # Example
    ///
    /// ```
    /// use synthgraph::event_bus::Event;
    ///
    /// let event = Event::diagnostic("test", "message");
    /// let json_str = event.to_json_string().unwrap();
    /// assert!(json_str.contains("\"type\":\"diagnostic\""));
    /// ```
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }

    /// Convert event to pretty-printed JSON string with indentation.
    ///
    /// Useful for debugging and log files where human readability is important.
    ///
    /// # Example
    ///
    /// ```
    /// use synthgraph::event_bus::Event;
    ///
    /// let event = Event::node_message("test", "hello");
    /// let json_str = event.to_json_pretty().unwrap();
    /// assert!(json_str.contains("  \"type\": \"node\""));
    /// ```
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_json_value())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Node(node) => match (node.node_id(), node.step()) {
                (Some(id), Some(step)) => write!(f, "[{id}@{step}] {}", node.message()),
                (Some(id), None) => write!(f, "[{id}] {}", node.message()),
                (None, Some(step)) => write!(f, "[step {step}] {}", node.message()),
                (None, None) => write!(f, "{}", node.message()),
            },
            Event::Diagnostic(diag) => write!(f, "{}", diag.message()),
            Event::LLM(llm) => {
                if let Some(stream_id) = llm.stream_id() {
                    write!(f, "[LLM {stream_id}] {}", llm.chunk())
                } else if let Some(node_id) = llm.node_id() {
                    write!(f, "[LLM {node_id}] {}", llm.chunk())
                } else {
                    write!(f, "{}", llm.chunk())
                }
            }
            Event::Session(session) => write!(
                f,
                "[{}#{}] {}",
                session.session_id,
                session.sequence,
                session.kind.message()
            ),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeEvent {
    node_id: Option<String>,
    step: Option<u64>,
    scope: String,
    message: String,
}

impl NodeEvent {
    pub fn new(node_id: Option<String>, step: Option<u64>, scope: String, message: String) -> Self {
        Self {
            node_id,
            step,
            scope,
            message,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn step(&self) -> Option<u64> {
        self.step
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    scope: String,
    message: String,
}

impl DiagnosticEvent {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMStreamingEventScope {
    Streaming,
    Chunk,
    Final,
    Error,
}

impl AsRef<str> for LLMStreamingEventScope {
    fn as_ref(&self) -> &str {
        match self {
            LLMStreamingEventScope::Chunk => "chunk",
            LLMStreamingEventScope::Streaming => "stream",
            LLMStreamingEventScope::Final => STREAM_END_SCOPE,
            LLMStreamingEventScope::Error => "error",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LLMStreamingEvent {
    session_id: Option<String>,
    node_id: Option<String>,
    stream_id: Option<String>,
    chunk: String,
    is_final: bool,
    scope: LLMStreamingEventScope,
    metadata: FxHashMap<String, Value>,
    timestamp: DateTime<Utc>,
}

impl LLMStreamingEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: Option<String>,
        node_id: Option<String>,
        stream_id: Option<String>,
        chunk: impl Into<String>,
        is_final: bool,
        scope: Option<LLMStreamingEventScope>,
        metadata: FxHashMap<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            node_id,
            stream_id,
            chunk: chunk.into(),
            is_final,
            scope: scope.unwrap_or(LLMStreamingEventScope::Streaming),
            metadata,
            timestamp,
        }
    }

    pub fn chunk_event(
        session_id: Option<String>,
        node_id: Option<String>,
        stream_id: Option<String>,
        chunk: impl Into<String>,
        metadata: FxHashMap<String, Value>,
    ) -> Self {
        Self::new(
            session_id,
            node_id,
            stream_id,
            chunk,
            false,
            Some(LLMStreamingEventScope::Chunk),
            metadata,
            Utc::now(),
        )
    }

    pub fn final_event(
        session_id: Option<String>,
        node_id: Option<String>,
        stream_id: Option<String>,
        chunk: impl Into<String>,
        metadata: FxHashMap<String, Value>,
    ) -> Self {
        Self::new(
            session_id,
            node_id,
            stream_id,
            chunk,
            true,
            Some(LLMStreamingEventScope::Final),
            metadata,
            Utc::now(),
        )
    }

    pub fn error_event(
        session_id: Option<String>,
        node_id: Option<String>,
        stream_id: Option<String>,
        error_message: impl Into<String>,
    ) -> Self {
        let mut metadata = FxHashMap::default();
        metadata.insert("severity".to_string(), Value::String("error".to_string()));
        Self::new(
            session_id,
            node_id,
            stream_id,
            error_message,
            true,
            Some(LLMStreamingEventScope::Error),
            metadata,
            Utc::now(),
        )
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    pub fn chunk(&self) -> &str {
        &self.chunk
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn scope(&self) -> &LLMStreamingEventScope {
        &self.scope
    }

    pub fn metadata(&self) -> &FxHashMap<String, Value> {
        &self.metadata
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn with_metadata(mut self, metadata: FxHashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A session-scoped orchestration event: the research pipeline's externally
/// visible progress stream, distinct from the teacher's node-level telemetry.
/// Every event carries a monotonically increasing `sequence` (per session)
/// so a transport can detect drops or reordering.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub kind: SessionEventKind,
}

impl SessionEvent {
    #[must_use]
    pub fn new(sequence: u64, session_id: impl Into<String>, kind: SessionEventKind) -> Self {
        Self {
            sequence,
            timestamp: Utc::now(),
            session_id: session_id.into(),
            kind,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Quality summary attached to an `AnalysisResult` event. A flattened view of
/// [`QualityScore`] plus the gap report, since the wire payload does not need
/// the per-document breakdown the internal type carries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSummary {
    pub quality: QualityScore,
    pub gap: GapReport,
}

/// The nine session-scoped event kinds a research session emits, in the
/// order a well-formed session produces them: one `SessionStarted`, then
/// interleaved `StepStarted`/`StepProgress`/`StepCompleted`/`ModelUsage`/
/// `AnalysisResult`/`SectionGenerated` per iteration, then exactly one of
/// `Final` or `Error`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum SessionEventKind {
    SessionStarted { topic: String, report_type: String },
    StepStarted { step: String },
    StepProgress { step: String, message: String, metadata: serde_json::Value },
    StepCompleted { step: String },
    ModelUsage { usage: UsageRecord },
    AnalysisResult { summary: AnalysisSummary },
    SectionGenerated { outline_id: u32, word_count: usize },
    Error { error_type: String, message: String },
    Final { report_path: String, word_count: usize },
}

impl SessionEventKind {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            SessionEventKind::SessionStarted { .. } => "session_started",
            SessionEventKind::StepStarted { .. } => "step_started",
            SessionEventKind::StepProgress { .. } => "step_progress",
            SessionEventKind::StepCompleted { .. } => "step_completed",
            SessionEventKind::ModelUsage { .. } => "model_usage",
            SessionEventKind::AnalysisResult { .. } => "analysis_result",
            SessionEventKind::SectionGenerated { .. } => "section_generated",
            SessionEventKind::Error { .. } => "error",
            SessionEventKind::Final { .. } => "final",
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            SessionEventKind::SessionStarted { topic, .. } => topic.as_str(),
            SessionEventKind::StepStarted { step } | SessionEventKind::StepCompleted { step } => {
                step.as_str()
            }
            SessionEventKind::StepProgress { message, .. } => message.as_str(),
            SessionEventKind::ModelUsage { usage } => usage.model.as_str(),
            SessionEventKind::AnalysisResult { .. } => "analysis result ready",
            SessionEventKind::SectionGenerated { .. } => "section generated",
            SessionEventKind::Error { message, .. } => message.as_str(),
            SessionEventKind::Final { report_path, .. } => report_path.as_str(),
        }
    }

    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            SessionEventKind::SessionStarted { topic, report_type } => json!({
                "kind": "session_started",
                "topic": topic,
                "report_type": report_type,
            }),
            SessionEventKind::StepStarted { step } => json!({
                "kind": "step_started",
                "step": step,
            }),
            SessionEventKind::StepProgress {
                step,
                message,
                metadata,
            } => json!({
                "kind": "step_progress",
                "step": step,
                "message": message,
                "metadata": metadata,
            }),
            SessionEventKind::StepCompleted { step } => json!({
                "kind": "step_completed",
                "step": step,
            }),
            SessionEventKind::ModelUsage { usage } => json!({
                "kind": "model_usage",
                "provider": usage.provider,
                "model": usage.model,
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
                "wall_time_ms": usage.wall_time_ms,
            }),
            SessionEventKind::AnalysisResult { summary } => json!({
                "kind": "analysis_result",
                "quality": {
                    "relevance": summary.quality.relevance,
                    "practicality": summary.quality.practicality,
                    "timeliness": summary.quality.timeliness,
                    "authority": summary.quality.authority,
                    "completeness": summary.quality.completeness,
                    "accuracy": summary.quality.accuracy,
                    "total": summary.quality.total,
                },
                "gap": {
                    "score": summary.gap.score,
                    "missing_aspects": summary.gap.missing_aspects,
                    "weak_sources": summary.gap.weak_sources,
                    "staleness": summary.gap.staleness,
                },
            }),
            SessionEventKind::SectionGenerated {
                outline_id,
                word_count,
            } => json!({
                "kind": "section_generated",
                "outline_id": outline_id,
                "word_count": word_count,
            }),
            SessionEventKind::Error {
                error_type,
                message,
            } => json!({
                "kind": "error",
                "error_type": error_type,
                "message": message,
            }),
            SessionEventKind::Final {
                report_path,
                word_count,
            } => json!({
                "kind": "final",
                "report_path": report_path,
                "word_count": word_count,
            }),
        }
    }
}
