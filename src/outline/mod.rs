//! Report outline tree and its builder/refiner.

use serde::{Deserialize, Serialize};

use crate::documents::Document;
use crate::llm::LlmClient;

/// One node of the outline tree.
///
/// `id` is stable and unique within the whole tree; `RefineOutline` preserves
/// IDs across unchanged titles so downstream section caching can key on them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub key_points: Vec<String>,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    #[must_use]
    pub fn leaf(id: u32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            key_points: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_key_points(mut self, key_points: Vec<String>) -> Self {
        self.key_points = key_points;
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of leaves in the subtree rooted at this node (this node itself
    /// if it has no children).
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(OutlineNode::leaf_count).sum()
        }
    }

    /// Depth of the deepest descendant, 0 for a bare leaf.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.children
            .iter()
            .map(|c| 1 + c.depth())
            .max()
            .unwrap_or(0)
    }

    /// In-order iteration over every leaf node in the subtree.
    pub fn leaves(&self) -> Vec<&OutlineNode> {
        if self.is_leaf() {
            vec![self]
        } else {
            self.children.iter().flat_map(OutlineNode::leaves).collect()
        }
    }
}

/// Report type, driving the section-template the outline builder starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Comprehensive,
    Insight,
    Industry,
    Research,
    NewsReport,
    Search,
    Analysis,
}

impl ReportType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Comprehensive => "comprehensive",
            ReportType::Insight => "insight",
            ReportType::Industry => "industry",
            ReportType::Research => "research",
            ReportType::NewsReport => "news_report",
            ReportType::Search => "search",
            ReportType::Analysis => "analysis",
        }
    }
}

/// Errors raised by outline construction and validation.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum OutlineError {
    #[error("outline section titles must be unique within a parent, duplicate: {0}")]
    #[diagnostic(code(synthgraph::outline::duplicate_title))]
    DuplicateTitle(String),

    #[error("outline section title must not be empty")]
    #[diagnostic(code(synthgraph::outline::empty_title))]
    EmptyTitle,

    #[error("outline depth {0} exceeds the maximum of {1}")]
    #[diagnostic(code(synthgraph::outline::depth_exceeded))]
    DepthExceeded(u32, u32),

    #[error("leaf \"{0}\" has no key points")]
    #[diagnostic(code(synthgraph::outline::missing_key_points))]
    MissingKeyPoints(String),
}

/// Maximum outline depth permitted after generation.
pub const MAX_DEPTH: u32 = 4;

/// Produces and refines the report's outline tree.
pub struct OutlineBuilder;

impl OutlineBuilder {
    /// Build a fresh outline skeleton for `topic` under `report_type`, seeded
    /// from a handful of sample documents (used only to pick 3-6 key points
    /// per leaf in the deterministic fallback path; an LLM-backed
    /// implementation would instead draft titles/points from the documents).
    #[must_use]
    pub fn build_outline(
        topic: &str,
        report_type: ReportType,
        sample_docs: &[Document],
    ) -> OutlineNode {
        let mut next_id = 0u32;
        let mut alloc = || {
            let id = next_id;
            next_id += 1;
            id
        };

        let mut root_children = Vec::new();
        root_children.push(
            OutlineNode::leaf(alloc(), "Introduction", format!("Overview of {topic}"))
                .with_key_points(vec![
                    format!("Why {topic} matters right now"),
                    "Scope and structure of this report".to_string(),
                ]),
        );

        let core_titles = Self::core_section_titles(report_type);
        for title in core_titles {
            let key_points = Self::key_points_from_docs(topic, sample_docs);
            root_children.push(
                OutlineNode::leaf(alloc(), title, format!("{title} as it relates to {topic}"))
                    .with_key_points(key_points),
            );
        }

        root_children.push(
            OutlineNode::leaf(alloc(), "Conclusion", format!("Synthesis and outlook for {topic}"))
                .with_key_points(vec![
                    "Summary of findings".to_string(),
                    "Outlook and open questions".to_string(),
                ]),
        );

        OutlineNode::leaf(alloc(), topic, format!("Report on {topic}")).with_children(root_children)
    }

    fn core_section_titles(report_type: ReportType) -> Vec<&'static str> {
        match report_type {
            ReportType::Comprehensive | ReportType::Industry | ReportType::Insight => vec![
                "Market Landscape",
                "Key Drivers",
                "Competitive Dynamics",
                "Risks and Challenges",
                "Opportunities",
            ],
            ReportType::Research => vec![
                "Literature Review",
                "Methodology Landscape",
                "Key Findings",
                "Open Problems",
                "Future Directions",
            ],
            ReportType::NewsReport => vec![
                "Background",
                "Recent Developments",
                "Stakeholder Reactions",
                "What Comes Next",
            ],
            ReportType::Search | ReportType::Analysis => vec!["Findings", "Analysis"],
        }
    }

    fn key_points_from_docs(topic: &str, docs: &[Document]) -> Vec<String> {
        let mut points: Vec<String> = docs
            .iter()
            .take(4)
            .map(|d| {
                if d.title.is_empty() {
                    format!("Evidence from {}", d.domain)
                } else {
                    d.title.clone()
                }
            })
            .collect();
        if points.is_empty() {
            points.push(format!("Key considerations for {topic}"));
        }
        while points.len() < 3 {
            points.push(format!("Additional context on {topic}"));
        }
        points.truncate(6);
        points
    }

    /// Re-plan the outline given free-form feedback. IDs are preserved for
    /// leaves whose title is unchanged so downstream section caching survives
    /// a refinement pass; every unchanged leaf gets a refinement note
    /// appended to its description. `llm` is also asked whether the feedback
    /// calls for wholly new top-level sections; anything it proposes (or, on
    /// LLM unavailability, a single section synthesized from the feedback
    /// text itself) is appended to the root with a fresh id past the highest
    /// id already in use.
    #[must_use]
    pub fn refine_outline(llm: &dyn LlmClient, outline: &OutlineNode, feedback: &str) -> OutlineNode {
        let note = format!(" (refined: {feedback})");
        let mut refined = Self::refine_node(outline, &note, true);

        let mut next_id = Self::max_id(outline) + 1;
        for (title, description) in Self::new_sections_from_feedback(llm, feedback) {
            let key_points = vec![format!("Addresses feedback: {feedback}")];
            refined
                .children
                .push(OutlineNode::leaf(next_id, title, description).with_key_points(key_points));
            next_id += 1;
        }
        refined
    }

    fn max_id(node: &OutlineNode) -> u32 {
        node.children
            .iter()
            .map(Self::max_id)
            .fold(node.id, u32::max)
    }

    fn refine_node(node: &OutlineNode, note: &str, is_root: bool) -> OutlineNode {
        let description = if is_root {
            node.description.clone()
        } else {
            format!("{}{}", node.description, note)
        };
        let children = node
            .children
            .iter()
            .map(|c| Self::refine_node(c, note, false))
            .collect();
        OutlineNode {
            id: node.id,
            title: node.title.clone(),
            description,
            key_points: node.key_points.clone(),
            children,
        }
    }

    /// Ask the LLM whether `feedback` calls for wholly new top-level
    /// sections, falling back to a single feedback-derived section so a
    /// refinement pass never silently discards feedback when no model is
    /// configured.
    fn new_sections_from_feedback(llm: &dyn LlmClient, feedback: &str) -> Vec<(String, String)> {
        let prompt = format!(
            "Given this feedback on a report outline: \"{feedback}\", list any wholly \
             new top-level sections it calls for, one per line as `Title: description`. \
             Respond with nothing if no new section is needed."
        );
        match llm.complete(&prompt) {
            Ok(text) => Self::parse_new_sections(&text),
            Err(_) => Self::template_new_sections(feedback),
        }
    }

    fn parse_new_sections(text: &str) -> Vec<(String, String)> {
        text.lines()
            .filter_map(|line| {
                let (title, description) = line.trim().split_once(':')?;
                let title = title.trim();
                if title.is_empty() {
                    None
                } else {
                    Some((title.to_string(), description.trim().to_string()))
                }
            })
            .collect()
    }

    fn template_new_sections(feedback: &str) -> Vec<(String, String)> {
        let trimmed = feedback.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        vec![(
            Self::title_case(trimmed),
            format!("Added in response to feedback: {trimmed}"),
        )]
    }

    fn title_case(feedback: &str) -> String {
        let joined: String = feedback
            .split_whitespace()
            .take(6)
            .collect::<Vec<_>>()
            .join(" ");
        let mut chars = joined.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => joined,
        }
    }

    /// Validate structural invariants: unique titles per parent, non-empty
    /// titles, bounded depth, and every leaf carrying at least one key point.
    pub fn validate(outline: &OutlineNode) -> Result<(), OutlineError> {
        if outline.depth() > MAX_DEPTH {
            return Err(OutlineError::DepthExceeded(outline.depth(), MAX_DEPTH));
        }
        Self::validate_node(outline)
    }

    fn validate_node(node: &OutlineNode) -> Result<(), OutlineError> {
        if node.title.trim().is_empty() {
            return Err(OutlineError::EmptyTitle);
        }
        if node.is_leaf() && node.key_points.is_empty() {
            return Err(OutlineError::MissingKeyPoints(node.title.clone()));
        }
        let mut seen = std::collections::HashSet::new();
        for child in &node.children {
            if !seen.insert(child.title.clone()) {
                return Err(OutlineError::DuplicateTitle(child.title.clone()));
            }
            Self::validate_node(child)?;
        }
        Ok(())
    }
}
