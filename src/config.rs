//! Session and search configuration, resolved from environment variables at
//! construction and immutable thereafter, matching [`crate::runtimes::RuntimeConfig`]'s
//! builder idiom.

use std::time::Duration;

/// The §7 error taxonomy, surfaced externally as JSON-RPC error `data.type` strings.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    #[diagnostic(code(synthgraph::core::config_error))]
    ConfigError(String),

    #[error("provider error: {0}")]
    #[diagnostic(code(synthgraph::core::provider_error))]
    ProviderError(String),

    #[error("rate limited: {0}")]
    #[diagnostic(code(synthgraph::core::rate_limited))]
    RateLimited(String),

    #[error("model error: {0}")]
    #[diagnostic(code(synthgraph::core::model_error))]
    ModelError(String),

    #[error("timeout: {0}")]
    #[diagnostic(code(synthgraph::core::timeout_error))]
    TimeoutError(String),

    #[error("validation error: {0}")]
    #[diagnostic(code(synthgraph::core::validation_error))]
    ValidationError(String),

    #[error("cancelled")]
    #[diagnostic(code(synthgraph::core::cancelled))]
    Cancelled,
}

impl CoreError {
    /// The JSON-RPC error-data `type` string for this variant (§6/§7).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            CoreError::ConfigError(_) => "ConfigError",
            CoreError::ProviderError(_) => "ProviderError",
            CoreError::RateLimited(_) => "RateLimited",
            CoreError::ModelError(_) => "ModelError",
            CoreError::TimeoutError(_) => "TimeoutError",
            CoreError::ValidationError(_) => "ValidationError",
            CoreError::Cancelled => "Cancelled",
        }
    }

    /// Whether this variant is surfaced as a JSON-RPC error rather than
    /// absorbed into `StepProgress` with the final report still emitted.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::ConfigError(_)
                | CoreError::ValidationError(_)
                | CoreError::Cancelled
                | CoreError::TimeoutError(_)
        )
    }
}

/// One provider's API key, resolved from its environment variable. `None`
/// means the adapter is silently disabled, not an error.
#[derive(Clone, Debug, Default)]
pub struct ProviderKeys {
    pub tavily: Option<String>,
    pub brave: Option<String>,
    pub google_api_key: Option<String>,
    pub google_cse_id: Option<String>,
    pub news_api_key: Option<String>,
}

impl ProviderKeys {
    fn from_env() -> Self {
        Self {
            tavily: std::env::var("TAVILY_API_KEY").ok(),
            brave: std::env::var("BRAVE_API_KEY").ok(),
            google_api_key: std::env::var("GOOGLE_API_KEY").ok(),
            google_cse_id: std::env::var("GOOGLE_CSE_ID").ok(),
            news_api_key: std::env::var("NEWS_API_KEY").ok(),
        }
    }

    /// `arxiv` is always available: it requires no API key.
    #[must_use]
    pub fn configured_adapter_ids(&self) -> Vec<&'static str> {
        let mut ids = vec!["arxiv"];
        if self.tavily.is_some() {
            ids.push("tavily");
        }
        if self.brave.is_some() {
            ids.push("brave");
        }
        if self.google_api_key.is_some() && self.google_cse_id.is_some() {
            ids.push("google");
        }
        if self.news_api_key.is_some() {
            ids.push("news");
        }
        ids
    }
}

/// LLM endpoint configuration, resolved from environment variables.
#[derive(Clone, Debug, Default)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl LlmConfig {
    fn from_env() -> Self {
        Self {
            base_url: std::env::var("LLM_BASE_URL").ok(),
            api_key: std::env::var("LLM_API_KEY").ok(),
            model: std::env::var("LLM_MODEL").ok(),
        }
    }
}

/// Per-session overrides accepted via `kwargs` (§6). Upper bounds are
/// enforced by [`SessionConfig::new`], never by the caller.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub days: u32,
    pub quality_threshold: f64,
    pub max_iterations: u32,
    pub companies: Vec<String>,
    pub language: String,
    pub include_citations: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            days: 7,
            quality_threshold: 0.7,
            max_iterations: 3,
            companies: Vec::new(),
            language: "zh-CN".to_string(),
            include_citations: true,
        }
    }
}

impl SearchConfig {
    pub const MAX_DAYS: u32 = 365;
    pub const MAX_ITERATIONS: u32 = 10;

    /// Clamp `days` and `max_iterations` to their documented upper bounds and
    /// `quality_threshold` into `[0, 1]`.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.days = self.days.min(Self::MAX_DAYS);
        self.max_iterations = self.max_iterations.min(Self::MAX_ITERATIONS);
        self.quality_threshold = self.quality_threshold.clamp(0.0, 1.0);
        self
    }
}

/// Whole-session configuration: env-resolved provider/LLM credentials plus
/// the per-session search overrides and budgets.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub providers: ProviderKeys,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub wall_time_budget: Duration,
    pub per_iteration_time_budget: Duration,
    /// When `false`, a partial report may be assembled and emitted on
    /// cancellation instead of only a JSON-RPC error.
    pub emit_partial_on_cancel: bool,
    pub auto_confirm: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            providers: ProviderKeys::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            wall_time_budget: Duration::from_secs(600),
            per_iteration_time_budget: Duration::from_secs(120),
            emit_partial_on_cancel: false,
            auto_confirm: true,
        }
    }
}

impl SessionConfig {
    /// Load provider/LLM credentials from the environment (loading `.env`
    /// once via `dotenvy`) and overlay the given per-session search config.
    ///
    /// Returns [`CoreError::ConfigError`] when zero adapters end up
    /// configured (§6/S6: zero providers is fatal at session start).
    pub fn resolve(search: SearchConfig) -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();
        let providers = ProviderKeys::from_env();
        if providers.configured_adapter_ids().is_empty() {
            return Err(CoreError::ConfigError(
                "no retrieval adapters are configured".to_string(),
            ));
        }
        Ok(Self {
            providers,
            llm: LlmConfig::from_env(),
            search: search.clamped(),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_emit_partial_on_cancel(mut self, emit: bool) -> Self {
        self.emit_partial_on_cancel = emit;
        self
    }

    #[must_use]
    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }
}
