//! JSON-RPC 2.0 wire protocol: session submission, the `auto` task_type
//! classifier, and outbound notification/result/error envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CoreError;
use crate::event_bus::SessionEventKind;
use crate::outline::ReportType;

/// A session submission request: `{ task, task_type, kwargs }`.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionRequest {
    pub task: String,
    pub task_type: String,
    #[serde(default)]
    pub kwargs: Value,
}

impl SessionRequest {
    /// Resolve `task_type` to a concrete [`ReportType`], running the `auto`
    /// classifier when `task_type == "auto"`.
    #[must_use]
    pub fn resolve_report_type(&self) -> ReportType {
        if self.task_type.eq_ignore_ascii_case("auto") {
            classify_task(&self.task)
        } else {
            parse_report_type(&self.task_type).unwrap_or(ReportType::Comprehensive)
        }
    }
}

fn parse_report_type(task_type: &str) -> Option<ReportType> {
    match task_type {
        "news_report" => Some(ReportType::NewsReport),
        "insight" => Some(ReportType::Insight),
        "industry" => Some(ReportType::Industry),
        "research" => Some(ReportType::Research),
        "comprehensive" => Some(ReportType::Comprehensive),
        "search" => Some(ReportType::Search),
        "analysis" => Some(ReportType::Analysis),
        _ => None,
    }
}

/// Closed, ordered, case-insensitive substring classifier (§6.1). First
/// match wins; no match falls back to `comprehensive`.
#[must_use]
pub fn classify_task(task: &str) -> ReportType {
    const TABLE: &[(&[&str], ReportType)] = &[
        (&["news", "breaking", "latest development"], ReportType::NewsReport),
        (&["insight", "opinion", "perspective"], ReportType::Insight),
        (&["industry", "market", "sector"], ReportType::Industry),
        (
            &["research", "academic", "literature", "paper"],
            ReportType::Research,
        ),
        (&["search", "find", "look up"], ReportType::Search),
        (&["analy"], ReportType::Analysis),
    ];
    let lower = task.to_lowercase();
    for (keywords, report_type) in TABLE {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *report_type;
        }
    }
    ReportType::Comprehensive
}

/// JSON-RPC 2.0 notification envelope. `method` is one of `session/started`,
/// `notifications/message`, `session/completed`, `tools/result`.
#[derive(Clone, Debug, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl JsonRpcNotification {
    fn new(method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }

    #[must_use]
    pub fn session_started(session_id: &str) -> Self {
        Self::new("session/started", serde_json::json!({ "session_id": session_id }))
    }

    #[must_use]
    pub fn session_completed(session_id: &str) -> Self {
        Self::new("session/completed", serde_json::json!({ "session_id": session_id }))
    }

    #[must_use]
    pub fn tools_result(session_id: &str, report: Value) -> Self {
        Self::new(
            "tools/result",
            serde_json::json!({ "session_id": session_id, "report": report }),
        )
    }

    /// Translate one [`SessionEventKind`] into its `notifications/message`
    /// payload, discriminated per §6: a plain `status`/`message`/`details`
    /// shape for most kinds, or `type: "model_usage"` for [`SessionEventKind::ModelUsage`].
    #[must_use]
    pub fn from_session_event(kind: &SessionEventKind) -> Self {
        let params = match kind {
            SessionEventKind::ModelUsage { usage } => serde_json::json!({
                "type": "model_usage",
                "model_provider": usage.provider,
                "model_name": usage.model,
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
            }),
            other => serde_json::json!({
                "status": other.label(),
                "message": other.message(),
                "details": other.to_json_value(),
            }),
        };
        Self::new("notifications/message", params)
    }
}

/// JSON-RPC 2.0 error object: `{code, message, data: {type, message}}`.
#[derive(Clone, Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    pub data: JsonRpcErrorData,
}

#[derive(Clone, Debug, Serialize)]
pub struct JsonRpcErrorData {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub message: String,
}

impl JsonRpcError {
    /// Build the JSON-RPC error envelope for a fatal [`CoreError`].
    ///
    /// Only [`CoreError::is_session_fatal`] variants are meant to be surfaced
    /// this way; everything else should be reported via `StepProgress`.
    #[must_use]
    pub fn from_core_error(error: &CoreError) -> Self {
        Self {
            code: -32000,
            message: error.to_string(),
            data: JsonRpcErrorData {
                error_type: error.type_name(),
                message: error.to_string(),
            },
        }
    }
}
