//! Canonical document model and provider-record normalization.
//!
//! A [`Document`] is the one shape every downstream component (analyzer,
//! outline builder, section writer) agrees on, regardless of which adapter
//! produced the underlying raw record. Normalization is pure and total: it
//! never calls out to the network or an LLM.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The retrieval category a source belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Web,
    Academic,
    News,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Web => write!(f, "web"),
            SourceType::Academic => write!(f, "academic"),
            SourceType::News => write!(f, "news"),
        }
    }
}

/// A normalized, immutable retrieved record.
///
/// Constructed only by [`Normalizer::normalize`]; there are no setters, so a
/// `Document` in hand is guaranteed to already satisfy the normalization
/// invariants (non-empty `url`, populated `source_type`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub content: String,
    /// Identity key. Trimmed, non-empty.
    pub url: String,
    /// The adapter id that produced this record (e.g. `"tavily"`).
    pub source: String,
    pub source_type: SourceType,
    pub publish_date: Option<NaiveDate>,
    pub authors: Vec<String>,
    pub venue: Option<String>,
    pub score: Option<f64>,
    pub language: Option<String>,
    /// Lowercased host extracted from `url`.
    pub domain: String,
}

impl Document {
    /// Days since `publish_date`, relative to `today`. `None` when undated.
    #[must_use]
    pub fn days_since_publish(&self, today: NaiveDate) -> Option<i64> {
        self.publish_date.map(|d| (today - d).num_days().max(0))
    }
}

/// A provider-specific raw record, not yet normalized.
///
/// Adapters produce these; the `Normalizer` is the only component allowed to
/// turn one into a [`Document`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub fields: serde_json::Map<String, Value>,
}

impl RawRecord {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    fn get_str(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
    }
}

/// Pure conversion from provider-specific records to the canonical [`Document`].
pub struct Normalizer;

const CONTENT_FIELDS: &[&str] = &["content", "summary", "abstract", "snippet", "description"];
const DATE_FIELDS: &[&str] = &[
    "publish_date",
    "published",
    "date",
    "year",
    "publication_date",
];

impl Normalizer {
    /// Normalize one raw record. Returns `None` when the record has no usable
    /// URL (a missing/invalid URL drops the record rather than erroring).
    #[must_use]
    pub fn normalize(source: &str, source_type: SourceType, raw: &RawRecord) -> Option<Document> {
        let url = raw.get_str("url")?;
        if url.is_empty() {
            return None;
        }

        let title = raw.get_str("title").unwrap_or_default();
        let content = CONTENT_FIELDS
            .iter()
            .find_map(|field| raw.get_str(field))
            .unwrap_or_default();

        let authors = Self::parse_authors(raw);
        let publish_date = DATE_FIELDS
            .iter()
            .find_map(|field| raw.get(field))
            .and_then(Self::parse_date);

        let domain = Self::domain_of(&url);

        Some(Document {
            title,
            content,
            url,
            source: source.to_string(),
            source_type,
            publish_date,
            authors,
            venue: raw.get_str("venue"),
            score: raw.get("score").and_then(Value::as_f64),
            language: raw.get_str("language"),
            domain,
        })
    }

    fn parse_authors(raw: &RawRecord) -> Vec<String> {
        match raw.get("authors") {
            Some(Value::String(s)) => s
                .split([',', ';'])
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn parse_date(value: &Value) -> Option<NaiveDate> {
        match value {
            Value::String(s) => {
                let s = s.trim();
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    return Some(d);
                }
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
                    return Some(d);
                }
                if let Ok(year) = s.parse::<i32>() {
                    return NaiveDate::from_ymd_opt(year, 1, 1);
                }
                None
            }
            Value::Number(n) => {
                let year = n.as_i64()?;
                NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, 1, 1)
            }
            _ => None,
        }
    }

    fn domain_of(url: &str) -> String {
        let without_scheme = url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(url);
        let host = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or(without_scheme);
        let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
        host.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, Value)]) -> RawRecord {
        let mut fields = serde_json::Map::new();
        for (k, v) in pairs {
            fields.insert((*k).to_string(), v.clone());
        }
        RawRecord { fields }
    }

    #[test]
    fn missing_url_drops_record() {
        let r = raw(&[("title", Value::String("x".into()))]);
        assert!(Normalizer::normalize("tavily", SourceType::Web, &r).is_none());
    }

    #[test]
    fn picks_first_non_empty_content_field() {
        let r = raw(&[
            ("url", Value::String("https://example.com/a".into())),
            ("content", Value::String("".into())),
            ("summary", Value::String("hello".into())),
        ]);
        let doc = Normalizer::normalize("tavily", SourceType::Web, &r).unwrap();
        assert_eq!(doc.content, "hello");
        assert_eq!(doc.domain, "example.com");
    }

    #[test]
    fn bare_year_becomes_jan_first() {
        let r = raw(&[
            ("url", Value::String("https://example.com/b".into())),
            ("year", Value::String("2019".into())),
        ]);
        let doc = Normalizer::normalize("arxiv", SourceType::Academic, &r).unwrap();
        assert_eq!(doc.publish_date, NaiveDate::from_ymd_opt(2019, 1, 1));
    }

    #[test]
    fn authors_split_on_comma_or_semicolon() {
        let r = raw(&[
            ("url", Value::String("https://example.com/c".into())),
            ("authors", Value::String("Alice; Bob, Carol".into())),
        ]);
        let doc = Normalizer::normalize("tavily", SourceType::Web, &r).unwrap();
        assert_eq!(doc.authors, vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn normalize_is_idempotent() {
        let r = raw(&[
            ("url", Value::String("https://example.com/d".into())),
            ("content", Value::String("same content".into())),
        ]);
        let a = Normalizer::normalize("tavily", SourceType::Web, &r).unwrap();
        let b = Normalizer::normalize("tavily", SourceType::Web, &r).unwrap();
        assert_eq!(a, b);
    }
}
