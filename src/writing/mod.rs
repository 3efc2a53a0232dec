//! Section and summary generation.

use serde::{Deserialize, Serialize};

use crate::documents::Document;
use crate::llm::LlmClient;
use crate::outline::OutlineNode;

/// A citation pointing back at one of the documents consulted for a section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub title: String,
}

/// Generated content for one outline leaf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub outline_id: u32,
    pub content: String,
    pub citations: Vec<Citation>,
    pub word_count: usize,
}

impl Section {
    #[must_use]
    pub fn new(outline_id: u32, content: String, citations: Vec<Citation>) -> Self {
        let word_count = content.split_whitespace().count();
        Self {
            outline_id,
            content,
            citations,
            word_count,
        }
    }
}

/// Writing style knobs for [`SectionWriter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    Professional,
    Academic,
    Casual,
    Technical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Objective,
    Persuasive,
    Analytical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Brief,
    Detailed,
    Comprehensive,
}

/// Full configuration for one section-writing call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub style: Style,
    pub audience: String,
    pub tone: Tone,
    pub depth: Depth,
    pub include_examples: bool,
    pub include_citations: bool,
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            style: Style::Professional,
            audience: "general business readers".to_string(),
            tone: Tone::Objective,
            depth: Depth::Detailed,
            include_examples: true,
            include_citations: true,
            min_length: 800,
            max_length: 2000,
        }
    }
}

/// Minimum number of sub-headings required for long, comprehensive sections.
const MIN_SUBHEADINGS_FOR_COMPREHENSIVE: usize = 7;
const LONG_SECTION_THRESHOLD: usize = 1500;
const MAX_RETRIES: u8 = 2;

/// Generates long-form content for one outline section.
pub struct SectionWriter;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SectionError {
    #[error("section for \"{0}\" failed to satisfy its length band after {1} retries")]
    #[diagnostic(code(synthgraph::writing::length_band))]
    LengthBandUnsatisfied(String, u8),

    #[error("comprehensive section \"{0}\" has fewer than {1} sub-headings")]
    #[diagnostic(code(synthgraph::writing::missing_subheadings))]
    MissingSubheadings(String, usize),
}

impl SectionWriter {
    /// Write one section. `docs_for_section` must already be scoped to this
    /// outline node; every citation's URL is drawn from that set.
    pub fn write_section(
        llm: &dyn LlmClient,
        node: &OutlineNode,
        docs_for_section: &[Document],
        config: &SectionConfig,
    ) -> Result<Section, SectionError> {
        let mut instruction = Instruction::Initial;
        let mut last_content = String::new();
        let mut last_citations = Vec::new();

        for attempt in 0..=MAX_RETRIES {
            let (content, citations) =
                Self::draft(llm, node, docs_for_section, config, instruction);
            last_content = content;
            last_citations = citations;

            if last_content.len() < config.min_length {
                instruction = Instruction::Expand;
            } else if last_content.len() > config.max_length {
                instruction = Instruction::Tighten;
            } else {
                return Self::finish(node, config, last_content, last_citations);
            }

            if attempt == MAX_RETRIES {
                break;
            }
        }

        Self::finish(node, config, last_content, last_citations)
    }

    fn finish(
        node: &OutlineNode,
        config: &SectionConfig,
        content: String,
        citations: Vec<Citation>,
    ) -> Result<Section, SectionError> {
        if matches!(config.depth, Depth::Comprehensive) && config.max_length >= LONG_SECTION_THRESHOLD
        {
            let subheadings = content
                .lines()
                .filter(|l| {
                    let t = l.trim_start();
                    t.starts_with("## ") || t.starts_with("### ") || t.starts_with("#### ")
                })
                .count();
            if subheadings < MIN_SUBHEADINGS_FOR_COMPREHENSIVE {
                return Err(SectionError::MissingSubheadings(
                    node.title.clone(),
                    MIN_SUBHEADINGS_FOR_COMPREHENSIVE,
                ));
            }
        }
        Ok(Section::new(node.id, content, citations))
    }

    fn draft(
        llm: &dyn LlmClient,
        node: &OutlineNode,
        docs: &[Document],
        config: &SectionConfig,
        instruction: Instruction,
    ) -> (String, Vec<Citation>) {
        let prompt = Self::prompt(node, docs, config, instruction);
        let body = llm
            .complete(&prompt)
            .unwrap_or_else(|_| Self::fallback_draft(node, docs, config));

        let citations = if config.include_citations {
            docs.iter()
                .take(Self::citation_budget(config))
                .map(|d| Citation {
                    url: d.url.clone(),
                    title: d.title.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        (body, citations)
    }

    fn citation_budget(config: &SectionConfig) -> usize {
        match config.depth {
            Depth::Brief => 2,
            Depth::Detailed => 4,
            Depth::Comprehensive => 8,
        }
    }

    fn prompt(
        node: &OutlineNode,
        docs: &[Document],
        config: &SectionConfig,
        instruction: Instruction,
    ) -> String {
        format!(
            "Write a {:?}-style, {:?}-tone section titled \"{}\" ({} key points) for an audience of {}. \
             Draw on {} supporting documents. Instruction: {:?}.",
            config.style,
            config.tone,
            node.title,
            node.key_points.len(),
            config.audience,
            docs.len(),
            instruction,
        )
    }

    /// Deterministic extractive fallback used when the LLM is unavailable.
    fn fallback_draft(node: &OutlineNode, docs: &[Document], config: &SectionConfig) -> String {
        let mut out = format!("## {}\n\n{}\n\n", node.title, node.description);
        for (i, point) in node.key_points.iter().enumerate() {
            out.push_str(&format!("### {}. {}\n\n", i + 1, point));
            if let Some(doc) = docs.get(i % docs.len().max(1)) {
                if config.include_citations && !doc.url.is_empty() {
                    out.push_str(&format!(
                        "{} [{}]({})\n\n",
                        doc.content.chars().take(280).collect::<String>(),
                        doc.title,
                        doc.url
                    ));
                }
            }
        }
        while out.len() < config.min_length {
            out.push_str("Further context continues to develop alongside this topic.\n\n");
        }
        out
    }
}

#[derive(Clone, Copy, Debug)]
enum Instruction {
    Initial,
    Expand,
    Tighten,
}

/// Output format for [`SummaryWriter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryFormat {
    Paragraph,
    BulletPoints,
    Structured,
    Executive,
    Academic,
}

/// Constraints for one summary-writing call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryConstraints {
    pub max_words: usize,
    pub format: SummaryFormat,
    pub focus_areas: Vec<String>,
    pub tone: Option<String>,
    pub audience: Option<String>,
}

/// Condenses documents or section drafts into one or more summary formats.
///
/// Never introduces facts absent from the input: the LLM-unavailable path is
/// purely extractive, scored by keyword overlap and numeric-token presence.
pub struct SummaryWriter;

impl SummaryWriter {
    #[must_use]
    pub fn write_summary(
        llm: &dyn LlmClient,
        inputs: &[String],
        constraints: &SummaryConstraints,
    ) -> String {
        let joined = inputs.join("\n\n");
        let prompt = format!(
            "Summarize the following in {:?} format within {} words, focusing on: {}.\n\n{}",
            constraints.format,
            constraints.max_words,
            constraints.focus_areas.join(", "),
            joined
        );
        llm.complete(&prompt)
            .unwrap_or_else(|_| Self::extractive_fallback(inputs, constraints))
    }

    fn extractive_fallback(inputs: &[String], constraints: &SummaryConstraints) -> String {
        let mut sentences: Vec<(&str, usize)> = inputs
            .iter()
            .flat_map(|s| s.split(['.', '\n']))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| (s, Self::score_sentence(s, &constraints.focus_areas)))
            .collect();
        sentences.sort_by(|a, b| b.1.cmp(&a.1));

        let mut out = String::new();
        let mut words_used = 0;
        for (sentence, _) in sentences {
            let words = sentence.split_whitespace().count();
            if words_used + words > constraints.max_words {
                break;
            }
            words_used += words;
            match constraints.format {
                SummaryFormat::BulletPoints => out.push_str(&format!("- {sentence}\n")),
                _ => out.push_str(&format!("{sentence}. ")),
            }
        }
        out
    }

    fn score_sentence(sentence: &str, focus_areas: &[String]) -> usize {
        let lower = sentence.to_lowercase();
        let focus_hits = focus_areas
            .iter()
            .filter(|f| lower.contains(&f.to_lowercase()))
            .count();
        let numeric_hits = sentence.chars().filter(|c| c.is_ascii_digit()).count().min(5);
        focus_hits * 2 + numeric_hits
    }
}
