//! Pure composition of outline + sections + summary into the final
//! Markdown artifact. Never calls an LLM or a provider; every input is
//! already materialized by the time [`ReportAssembler::assemble`] runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{GapReport, QualityScore};
use crate::outline::OutlineNode;
use crate::writing::{Citation, Section};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ReportError {
    #[error("no section found for outline leaf {0} (\"{1}\")")]
    #[diagnostic(code(synthgraph::report::missing_section))]
    MissingSection(u32, String),
}

/// Free-form session metadata folded into the report's header block.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub session_id: String,
    pub iteration_count: u32,
    pub sources_count: usize,
    pub model_usage_totals: HashMap<String, u64>,
    pub wall_time_ms: u64,
}

/// Fully assembled report, ready for serialization to Markdown.
#[derive(Clone, Debug)]
pub struct Report {
    pub topic: String,
    pub generated_at: DateTime<Utc>,
    pub outline: OutlineNode,
    pub sections: Vec<Section>,
    pub executive_summary: String,
    pub references: Vec<Citation>,
    pub quality_score: QualityScore,
    pub gap_report: GapReport,
    pub metadata: ReportMetadata,
}

/// Composes a [`Report`] from its parts and renders it to Markdown.
///
/// Pure: given the same inputs it always produces the same Markdown string,
/// modulo `generated_at`.
pub struct ReportAssembler;

impl ReportAssembler {
    /// Build a [`Report`], matching each outline leaf to its [`Section`] by
    /// `outline_id` and consolidating references in first-appearance order.
    pub fn assemble(
        topic: impl Into<String>,
        outline: OutlineNode,
        sections: Vec<Section>,
        executive_summary: impl Into<String>,
        quality_score: QualityScore,
        gap_report: GapReport,
        metadata: ReportMetadata,
        generated_at: DateTime<Utc>,
    ) -> Result<Report, ReportError> {
        let by_id: HashMap<u32, &Section> = sections.iter().map(|s| (s.outline_id, s)).collect();
        let mut ordered_sections = Vec::with_capacity(sections.len());
        for leaf in outline.leaves() {
            let section = by_id
                .get(&leaf.id)
                .ok_or_else(|| ReportError::MissingSection(leaf.id, leaf.title.clone()))?;
            ordered_sections.push((*section).clone());
        }

        let mut references = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for section in &ordered_sections {
            for citation in &section.citations {
                if seen.insert(citation.url.clone()) {
                    references.push(citation.clone());
                }
            }
        }

        Ok(Report {
            topic: topic.into(),
            generated_at,
            outline,
            sections: ordered_sections,
            executive_summary: executive_summary.into(),
            references,
            quality_score,
            gap_report,
            metadata,
        })
    }

    /// Render a [`Report`] to the deterministic Markdown layout described in
    /// the module docs: title + metadata, executive summary, table of
    /// contents with anchors, sections in outline order, references.
    #[must_use]
    pub fn render(report: &Report) -> String {
        let mut md = String::new();

        md.push_str(&format!("# {}\n\n", report.topic));
        md.push_str("## Metadata\n\n");
        md.push_str(&format!(
            "- Date: {}\n- Session: {}\n- Sources: {}\n- Iterations: {}\n- Quality: {:.2}\n\n",
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            report.metadata.session_id,
            report.metadata.sources_count,
            report.metadata.iteration_count,
            report.quality_score.total,
        ));

        md.push_str("## Executive Summary\n\n");
        md.push_str(&report.executive_summary);
        md.push_str("\n\n");

        md.push_str("## Table of Contents\n\n");
        for leaf in report.outline.leaves() {
            let anchor = Self::anchor(&leaf.title);
            md.push_str(&format!("- [{}](#{anchor})\n", leaf.title));
        }
        md.push('\n');

        for (leaf, section) in report.outline.leaves().into_iter().zip(&report.sections) {
            md.push_str(&format!("## {}\n\n", leaf.title));
            md.push_str(&section.content);
            md.push_str("\n\n");
        }

        md.push_str("## References\n\n");
        for (idx, citation) in report.references.iter().enumerate() {
            let title = if citation.title.is_empty() {
                citation.url.clone()
            } else {
                citation.title.clone()
            };
            md.push_str(&format!("{}. [{}]({})\n", idx + 1, title, citation.url));
        }

        md
    }

    /// GitHub-flavored-Markdown-style anchor slug: lowercase, spaces to
    /// hyphens, non-alphanumeric characters dropped.
    fn anchor(title: &str) -> String {
        title
            .to_lowercase()
            .chars()
            .filter_map(|c| {
                if c.is_alphanumeric() {
                    Some(c)
                } else if c.is_whitespace() || c == '-' {
                    Some('-')
                } else {
                    None
                }
            })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Sanitize a topic string for use in a filename: keep alphanumerics,
    /// spaces, underscores, and hyphens, drop everything else, then collapse
    /// spaces to underscores.
    #[must_use]
    pub fn sanitize_topic(topic: &str) -> String {
        let kept: String = topic
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_' || *c == '-')
            .collect();
        kept.split_whitespace().collect::<Vec<_>>().join("_")
    }

    /// `{safe_topic}_{report_type}_{YYYYMMDD_HHMMSS}.md`
    #[must_use]
    pub fn filename(topic: &str, report_type: &str, timestamp: DateTime<Utc>) -> String {
        format!(
            "{}_{}_{}.md",
            Self::sanitize_topic(topic),
            report_type,
            timestamp.format("%Y%m%d_%H%M%S")
        )
    }

    /// UTF-8 Markdown with a leading BOM, the format the file-writing sink
    /// persists to disk.
    #[must_use]
    pub fn to_bom_prefixed_bytes(markdown: &str) -> Vec<u8> {
        const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
        let mut bytes = Vec::with_capacity(BOM.len() + markdown.len());
        bytes.extend_from_slice(&BOM);
        bytes.extend_from_slice(markdown.as_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writing::Citation;

    fn outline() -> OutlineNode {
        OutlineNode::leaf(1, "Introduction", "intro").with_children(vec![])
    }

    fn tree() -> OutlineNode {
        OutlineNode {
            id: 0,
            title: "Root".into(),
            description: String::new(),
            key_points: vec![],
            children: vec![
                OutlineNode::leaf(1, "Introduction", "intro").with_key_points(vec!["a".into()]),
                OutlineNode::leaf(2, "Market Analysis", "market").with_key_points(vec!["b".into()]),
            ],
        }
    }

    fn section(id: u32, content: &str, urls: &[&str]) -> Section {
        Section {
            outline_id: id,
            content: content.into(),
            citations: urls
                .iter()
                .map(|u| Citation {
                    url: (*u).to_string(),
                    title: String::new(),
                })
                .collect(),
            word_count: content.split_whitespace().count(),
        }
    }

    #[test]
    fn assemble_orders_sections_by_outline_leaf_order() {
        let sections = vec![
            section(2, "market content", &["https://b.com"]),
            section(1, "intro content", &["https://a.com"]),
        ];
        let report = ReportAssembler::assemble(
            "Solar Energy",
            tree(),
            sections,
            "summary",
            QualityScore::new(0.8, 0.8, 0.8, 0.8, 0.8, 0.8),
            GapReport {
                score: 0.8,
                missing_aspects: vec![],
                weak_sources: vec![],
                staleness: 0.0,
            },
            ReportMetadata::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(report.sections[0].outline_id, 1);
        assert_eq!(report.sections[1].outline_id, 2);
    }

    #[test]
    fn missing_section_for_outline_leaf_errors() {
        let sections = vec![section(1, "intro content", &["https://a.com"])];
        let result = ReportAssembler::assemble(
            "Solar Energy",
            tree(),
            sections,
            "summary",
            QualityScore::new(0.8, 0.8, 0.8, 0.8, 0.8, 0.8),
            GapReport {
                score: 0.8,
                missing_aspects: vec![],
                weak_sources: vec![],
                staleness: 0.0,
            },
            ReportMetadata::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(ReportError::MissingSection(2, _))));
    }

    #[test]
    fn references_deduplicated_in_first_appearance_order() {
        let sections = vec![
            section(1, "intro", &["https://a.com", "https://b.com"]),
            section(2, "market", &["https://b.com", "https://c.com"]),
        ];
        let report = ReportAssembler::assemble(
            "Solar Energy",
            tree(),
            sections,
            "summary",
            QualityScore::new(0.8, 0.8, 0.8, 0.8, 0.8, 0.8),
            GapReport {
                score: 0.8,
                missing_aspects: vec![],
                weak_sources: vec![],
                staleness: 0.0,
            },
            ReportMetadata::default(),
            Utc::now(),
        )
        .unwrap();
        let urls: Vec<_> = report.references.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com", "https://b.com", "https://c.com"]);
    }

    #[test]
    fn render_includes_toc_and_references() {
        let sections = vec![
            section(1, "intro content", &["https://a.com"]),
            section(2, "market content", &["https://b.com"]),
        ];
        let report = ReportAssembler::assemble(
            "Solar Energy",
            tree(),
            sections,
            "An executive summary.",
            QualityScore::new(0.8, 0.8, 0.8, 0.8, 0.8, 0.8),
            GapReport {
                score: 0.8,
                missing_aspects: vec![],
                weak_sources: vec![],
                staleness: 0.0,
            },
            ReportMetadata {
                session_id: "s-1".into(),
                iteration_count: 2,
                sources_count: 5,
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        let markdown = ReportAssembler::render(&report);
        assert!(markdown.contains("# Solar Energy"));
        assert!(markdown.contains("## Table of Contents"));
        assert!(markdown.contains("[Introduction](#introduction)"));
        assert!(markdown.contains("## References"));
        assert!(markdown.contains("https://a.com"));
    }

    #[test]
    fn sanitize_topic_drops_punctuation_and_collapses_spaces() {
        assert_eq!(
            ReportAssembler::sanitize_topic("Solar Energy: 2024 Outlook!"),
            "Solar_Energy_2024_Outlook"
        );
    }

    #[test]
    fn filename_follows_template() {
        let ts = DateTime::parse_from_rfc3339("2024-06-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let name = ReportAssembler::filename("Solar Energy", "comprehensive", ts);
        assert_eq!(name, "Solar_Energy_comprehensive_20240601_123000.md");
    }

    #[test]
    fn bom_prefixed_bytes_start_with_utf8_bom() {
        let bytes = ReportAssembler::to_bom_prefixed_bytes("# Title\n");
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
    }

    #[test]
    fn single_leaf_tree_assembles() {
        let sections = vec![section(1, "intro content", &["https://a.com"])];
        let report = ReportAssembler::assemble(
            "Topic",
            outline(),
            sections,
            "summary",
            QualityScore::new(0.5, 0.5, 0.5, 0.5, 0.5, 0.5),
            GapReport {
                score: 0.5,
                missing_aspects: vec![],
                weak_sources: vec![],
                staleness: 0.0,
            },
            ReportMetadata::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(report.sections.len(), 1);
    }
}
