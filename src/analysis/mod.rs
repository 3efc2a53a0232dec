//! Per-document scoring and per-document-set quality/gap assessment.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::documents::Document;

/// Per-document six-dimension score. `total` is always the fixed weighted
/// sum, recomputed on construction so it can never drift from its inputs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub relevance: f64,
    pub practicality: f64,
    pub timeliness: f64,
    pub authority: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub total: f64,
}

/// Fixed dimension weights, in declaration order above (sans `total`).
pub const WEIGHTS: [f64; 6] = [0.25, 0.20, 0.15, 0.15, 0.15, 0.10];

impl QualityScore {
    #[must_use]
    pub fn new(
        relevance: f64,
        practicality: f64,
        timeliness: f64,
        authority: f64,
        completeness: f64,
        accuracy: f64,
    ) -> Self {
        let dims = [
            relevance,
            practicality,
            timeliness,
            authority,
            completeness,
            accuracy,
        ];
        let total = dims.iter().zip(WEIGHTS).map(|(d, w)| d * w).sum();
        Self {
            relevance,
            practicality,
            timeliness,
            authority,
            completeness,
            accuracy,
            total,
        }
    }
}

/// Aggregate coverage assessment over a document set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    /// Same scalar as [`Analyzer::quality_score`]: mean per-document total,
    /// diversity-penalized. Not the six-dimension breakdown that
    /// [`Analyzer::aggregate_quality`] produces for the final report's
    /// `quality_score` field; the two are computed from the same documents
    /// but serve different consumers (gating vs. reporting).
    pub score: f64,
    pub missing_aspects: Vec<String>,
    pub weak_sources: Vec<String>,
    pub staleness: f64,
}

/// Canonical aspect list used by the deterministic gap-detection fallback
/// when no LLM is available. Policy decision: fixed and documented rather
/// than inferred.
pub const CANONICAL_ASPECTS: [&str; 5] =
    ["market", "policy", "technology", "investment", "risk"];

/// A document older than this many days counts toward `staleness`.
pub const STALENESS_HORIZON_DAYS: i64 = 365;

/// Diversity-penalty policy: entropy below `DIVERSITY_THRESHOLD` is penalized
/// at `DIVERSITY_COEFFICIENT` per unit of shortfall.
pub const DIVERSITY_THRESHOLD: f64 = 0.6;
pub const DIVERSITY_COEFFICIENT: f64 = 0.2;

/// Classifies a domain into an authority tier for the base authority score.
fn authority_base(domain: &str) -> f64 {
    const ACADEMIC: &[&str] = &["arxiv.org", "acm.org", "ieee.org", "springer.com", "nature.com"];
    const GOVERNMENT_SUFFIXES: &[&str] = &[".gov", ".gov.cn", ".europa.eu"];
    const NEWS: &[&str] = &[
        "reuters.com",
        "bloomberg.com",
        "ft.com",
        "wsj.com",
        "nytimes.com",
    ];
    const TECH: &[&str] = &["techcrunch.com", "wired.com", "arstechnica.com", "theverge.com"];

    if ACADEMIC.iter().any(|d| domain.ends_with(d)) {
        0.95
    } else if GOVERNMENT_SUFFIXES.iter().any(|s| domain.ends_with(s)) {
        0.9
    } else if NEWS.iter().any(|d| domain.ends_with(d)) {
        0.8
    } else if TECH.iter().any(|d| domain.ends_with(d)) {
        0.7
    } else if domain.ends_with(".edu") {
        0.85
    } else if domain.ends_with(".org") {
        0.65
    } else {
        0.5
    }
}

fn timeliness_score(days_since: Option<i64>) -> f64 {
    match days_since {
        None => 0.5,
        Some(d) if d <= 30 => 1.0,
        Some(d) if d <= 90 => 0.9,
        Some(d) if d <= 180 => 0.8,
        Some(d) if d <= 365 => 0.6,
        Some(d) if d <= 730 => 0.4,
        Some(_) => 0.2,
    }
}

fn completeness_score(content_len: usize) -> f64 {
    if content_len >= 2000 {
        1.0
    } else if content_len >= 1000 {
        0.8
    } else if content_len >= 500 {
        0.6
    } else if content_len >= 200 {
        0.4
    } else {
        0.2
    }
}

/// Keyword-overlap heuristic used when the LLM is unavailable, for
/// relevance/practicality/accuracy.
fn keyword_overlap_score(topic: &str, content: &str) -> f64 {
    let topic_words: HashSet<String> = topic
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 2)
        .collect();
    if topic_words.is_empty() {
        return 0.5;
    }
    let content_lower = content.to_lowercase();
    let hits = topic_words
        .iter()
        .filter(|w| content_lower.contains(w.as_str()))
        .count();
    (hits as f64 / topic_words.len() as f64).clamp(0.0, 1.0)
}

const INDICATOR_WORDS: &[&str] = &[
    "data", "study", "report", "analysis", "survey", "statistics", "research",
];

fn indicator_word_score(content: &str) -> f64 {
    let lower = content.to_lowercase();
    let hits = INDICATOR_WORDS.iter().filter(|w| lower.contains(*w)).count();
    (hits as f64 / INDICATOR_WORDS.len() as f64).clamp(0.0, 1.0)
}

/// Per-document and per-set scoring. Every LLM-backed dimension has a
/// deterministic fallback so the pipeline never blocks on model availability.
pub struct Analyzer;

impl Analyzer {
    /// Score one document against `topic`, as of `today`.
    ///
    /// `relevance`/`practicality`/`accuracy` use the deterministic
    /// keyword-overlap/indicator-word fallback; an LLM-backed caller would
    /// substitute model-derived scores for those three dimensions only.
    #[must_use]
    pub fn score_document(topic: &str, doc: &Document, today: NaiveDate) -> QualityScore {
        let authority = authority_base(&doc.domain);
        let timeliness = timeliness_score(doc.days_since_publish(today));
        let completeness = completeness_score(doc.content.len());
        let relevance = keyword_overlap_score(topic, &doc.content);
        let practicality = indicator_word_score(&doc.content);
        let accuracy = (relevance + indicator_word_score(&doc.title)) / 2.0;

        QualityScore::new(
            relevance,
            practicality,
            timeliness,
            authority,
            completeness,
            accuracy,
        )
    }

    /// Aggregate quality across a document set: mean of per-document totals,
    /// penalized when source diversity (Shannon entropy of the source
    /// distribution, normalized to [0,1]) falls below [`DIVERSITY_THRESHOLD`].
    #[must_use]
    pub fn quality_score(topic: &str, docs: &[Document], today: NaiveDate) -> f64 {
        if docs.is_empty() {
            return 0.0;
        }
        let mean: f64 = docs
            .iter()
            .map(|d| Self::score_document(topic, d, today).total)
            .sum::<f64>()
            / docs.len() as f64;

        let entropy = Self::normalized_source_entropy(docs);
        let penalty = (DIVERSITY_THRESHOLD - entropy).max(0.0) * DIVERSITY_COEFFICIENT;
        (mean - penalty).clamp(0.0, 1.0)
    }

    fn normalized_source_entropy(docs: &[Document]) -> f64 {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for d in docs {
            *counts.entry(d.source.as_str()).or_insert(0) += 1;
        }
        let n = docs.len() as f64;
        let distinct = counts.len();
        if distinct <= 1 {
            return 0.0;
        }
        let entropy: f64 = counts
            .values()
            .map(|&c| {
                let p = c as f64 / n;
                -p * p.log2()
            })
            .sum();
        let max_entropy = (distinct as f64).log2();
        if max_entropy <= 0.0 {
            0.0
        } else {
            (entropy / max_entropy).clamp(0.0, 1.0)
        }
    }

    /// Coverage-gap assessment. Deterministic fallback: a canonical aspect is
    /// "missing" when zero or one document's content mentions it; a source is
    /// "weak" when it contributes exactly one document.
    #[must_use]
    pub fn gap_report(topic: &str, docs: &[Document], today: NaiveDate) -> GapReport {
        let score = Self::quality_score(topic, docs, today);

        let mut aspect_hits: HashMap<&str, usize> = CANONICAL_ASPECTS.iter().map(|a| (*a, 0)).collect();
        for doc in docs {
            let lower = doc.content.to_lowercase();
            for aspect in CANONICAL_ASPECTS {
                if lower.contains(aspect) {
                    *aspect_hits.get_mut(aspect).unwrap() += 1;
                }
            }
        }
        let mut missing_aspects: Vec<String> = CANONICAL_ASPECTS
            .iter()
            .filter(|a| aspect_hits[*a] <= 1)
            .map(|a| (*a).to_string())
            .collect();
        missing_aspects.sort();

        let mut source_counts: HashMap<&str, usize> = HashMap::new();
        for doc in docs {
            *source_counts.entry(doc.source.as_str()).or_insert(0) += 1;
        }
        let mut weak_sources: Vec<String> = source_counts
            .into_iter()
            .filter(|(_, count)| *count == 1)
            .map(|(source, _)| source.to_string())
            .collect();
        weak_sources.sort();

        let staleness = if docs.is_empty() {
            0.0
        } else {
            let stale = docs
                .iter()
                .filter(|d| {
                    d.days_since_publish(today)
                        .is_none_or(|days| days > STALENESS_HORIZON_DAYS)
                })
                .count();
            stale as f64 / docs.len() as f64
        };

        GapReport {
            score,
            missing_aspects,
            weak_sources,
            staleness,
        }
    }

    /// Session-level quality summary: each dimension averaged across the
    /// accumulated document set, with `total` recomputed from those averages
    /// (mirrors the per-document weighting in [`Analyzer::score_document`]).
    /// Feeds the final report's `quality_score` field; [`Analyzer::quality_score`]
    /// is the separate scalar used for the controller's acceptance gate.
    #[must_use]
    pub fn aggregate_quality(topic: &str, docs: &[Document], today: NaiveDate) -> QualityScore {
        if docs.is_empty() {
            return QualityScore::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        }
        let scores: Vec<_> = docs.iter().map(|d| Self::score_document(topic, d, today)).collect();
        let n = scores.len() as f64;
        let avg = |f: fn(&QualityScore) -> f64| scores.iter().map(f).sum::<f64>() / n;
        QualityScore::new(
            avg(|s| s.relevance),
            avg(|s| s.practicality),
            avg(|s| s.timeliness),
            avg(|s| s.authority),
            avg(|s| s.completeness),
            avg(|s| s.accuracy),
        )
    }
}
