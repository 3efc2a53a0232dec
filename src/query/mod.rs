//! Search query generation.

use serde::{Deserialize, Serialize};

use crate::analysis::GapReport;
use crate::llm::LlmClient;

/// Generation strategy. Only influences how queries are produced, never how
/// they are searched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Initial,
    Iterative,
    Targeted,
    Academic,
    News,
}

/// A generated search query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub strategy: Strategy,
}

/// Context consumed by the `targeted` and `iterative` strategies.
#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    /// Section title + description, for `targeted`.
    pub section: Option<(String, String)>,
    /// Coverage gaps to close, for `iterative`.
    pub gap_report: Option<GapReport>,
}

/// Derives search queries from a topic and strategy.
pub struct QueryGenerator;

impl QueryGenerator {
    /// Generate queries for `topic` under `strategy`, deduplicated
    /// case-insensitively. Falls back to a deterministic template generator
    /// when the LLM is unavailable.
    #[must_use]
    pub fn generate(
        llm: &dyn LlmClient,
        topic: &str,
        strategy: Strategy,
        context: &QueryContext,
    ) -> Vec<Query> {
        let prompt = Self::prompt(topic, strategy, context);
        let raw = llm
            .complete(&prompt)
            .map(|text| text.lines().map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_else(|_| Self::template_fallback(topic, strategy, context));

        Self::dedup_case_insensitive(raw)
            .into_iter()
            .map(|text| Query { text, strategy })
            .collect()
    }

    fn prompt(topic: &str, strategy: Strategy, context: &QueryContext) -> String {
        format!(
            "Generate search queries for topic \"{topic}\" using the {strategy:?} strategy. Context: {context:?}"
        )
    }

    fn dedup_case_insensitive(queries: Vec<String>) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .filter(|q| seen.insert(q.to_lowercase()))
            .collect()
    }

    /// Deterministic template-based fallback, guaranteeing the pipeline is
    /// never blocked by LLM unavailability.
    fn template_fallback(topic: &str, strategy: Strategy, context: &QueryContext) -> Vec<String> {
        match strategy {
            Strategy::Initial => vec![
                format!("{topic} overview"),
                format!("{topic} key subtopics"),
                format!("{topic} recent developments"),
                format!("{topic} latest news"),
            ],
            Strategy::Iterative => {
                let aspects = context
                    .gap_report
                    .as_ref()
                    .map(|g| g.missing_aspects.clone())
                    .unwrap_or_default();
                if aspects.is_empty() {
                    vec![format!("{topic} additional analysis")]
                } else {
                    aspects
                        .into_iter()
                        .take(4)
                        .map(|aspect| format!("{topic} {aspect}"))
                        .collect()
                }
            }
            Strategy::Targeted => {
                if let Some((title, description)) = &context.section {
                    vec![
                        format!("{topic} {title}"),
                        format!("{title} {description}"),
                    ]
                } else {
                    vec![format!("{topic} details")]
                }
            }
            Strategy::Academic => vec![
                format!("{topic} research paper"),
                format!("{topic} peer reviewed study"),
            ],
            Strategy::News => vec![
                format!("{topic} breaking news"),
                format!("{topic} latest development"),
            ],
        }
    }
}
