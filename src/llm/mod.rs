//! Opaque LLM client abstraction.
//!
//! The orchestration core never depends on a concrete model backend; it only
//! ever sees this trait. Every component that uses an [`LlmClient`] has a
//! deterministic fallback for when the call errors, so the pipeline is never
//! blocked by model unavailability (see [`TemplateFallbackClient`]).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token usage reported by one completion call, forwarded to the event bus
/// as a `ModelUsage` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub wall_time_ms: u64,
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LlmError {
    #[error("llm call failed: {0}")]
    #[diagnostic(code(synthgraph::llm::call_failed))]
    CallFailed(String),

    #[error("llm call timed out after {0:?}")]
    #[diagnostic(code(synthgraph::llm::timeout))]
    Timeout(Duration),

    #[error("llm returned malformed output: {0}")]
    #[diagnostic(code(synthgraph::llm::malformed_output))]
    MalformedOutput(String),
}

/// A synchronous text-completion seam, used by components that need a quick
/// deterministic-or-fallback answer (section writer, summary writer).
///
/// Async, usage-tracked calls go through [`AsyncLlmClient`] instead.
pub trait LlmClient: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Async counterpart used by components that run inside the scheduler and
/// need to report token usage back to the event bus.
#[async_trait]
pub trait AsyncLlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<(String, UsageRecord), LlmError>;
}

/// Deterministic, template-based stand-in used whenever the configured LLM
/// backend is unset or a call fails. Every LLM-using component is written so
/// that swapping this in changes nothing about control flow, only content
/// quality.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateFallbackClient;

impl LlmClient for TemplateFallbackClient {
    fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::CallFailed("template fallback has no model to call".into()))
    }
}

#[cfg(feature = "llm")]
pub mod rig_backend {
    //! `rig-core`-backed implementation, compiled only under the `llm` feature.

    use super::{AsyncLlmClient, LlmError, UsageRecord};
    use async_trait::async_trait;
    use rig::completion::CompletionModel;
    use std::time::Instant;

    /// Thin adapter around a `rig-core` completion model, reporting usage
    /// back for `ModelUsage` events.
    pub struct RigLlmClient<M> {
        model: M,
        model_name: String,
        preamble: String,
    }

    impl<M> RigLlmClient<M> {
        pub fn new(model: M, model_name: impl Into<String>, preamble: impl Into<String>) -> Self {
            Self {
                model,
                model_name: model_name.into(),
                preamble: preamble.into(),
            }
        }
    }

    #[async_trait]
    impl<M> AsyncLlmClient for RigLlmClient<M>
    where
        M: CompletionModel + Send + Sync,
    {
        async fn complete(&self, prompt: &str) -> Result<(String, UsageRecord), LlmError> {
            let start = Instant::now();
            let request = self
                .model
                .completion_request(rig::completion::Message::user(prompt.to_string()))
                .preamble(self.preamble.clone())
                .build();

            let response = self
                .model
                .completion(request)
                .await
                .map_err(|e| LlmError::CallFailed(e.to_string()))?;

            let text = response
                .choice
                .into_iter()
                .next()
                .map(|c| c.to_string())
                .ok_or_else(|| LlmError::MalformedOutput("empty completion choice list".into()))?;

            let usage = UsageRecord {
                provider: "rig-core".to_string(),
                model: self.model_name.clone(),
                input_tokens: (prompt.len() / 4) as u64,
                output_tokens: (text.len() / 4) as u64,
                wall_time_ms: start.elapsed().as_millis() as u64,
            };
            Ok((text, usage))
        }
    }
}
