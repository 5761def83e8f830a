//! Core data types used throughout LibFlix cover resolution.
//!
//! These types represent the catalog items, scored candidates, and
//! resolution results that flow between the generator, the resolver,
//! and the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A book as supplied by the catalog layer. Read-only during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default, alias = "primaryImageUrl")]
    pub primary_image_url: Option<String>,
    #[serde(default, alias = "fallbackUrls")]
    pub fallback_urls: Vec<String>,
}

impl CatalogItem {
    /// Whether the item carries an ISBN or a primary image URL.
    ///
    /// Items without either never reach the network.
    pub fn has_identifiers(&self) -> bool {
        let present = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.isbn) || present(&self.primary_image_url)
    }
}

/// Where a candidate URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Expanded from a provider template keyed by ISBN.
    Generated,
    /// The item's primary URL or one of its fallbacks.
    Supplied,
}

/// One scored URL considered for a cover image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub url: String,
    pub score: u8,
    pub source: CandidateSource,
}

/// Pixel size of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Per-call hint that only changes the timeout budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Normal,
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            other => Err(format!(
                "Unknown priority: '{}'. Must be high or normal.",
                other
            )),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => f.write_str("high"),
            Priority::Normal => f.write_str("normal"),
        }
    }
}

/// Why a resolution ended without an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No ISBN and no primary URL; nothing was attempted.
    NoIdentifiers,
    /// Both the primary pass and the retry pass ran out of candidates.
    ExhaustedAllCandidates,
}

/// Outcome of one `resolve_image` call.
///
/// `Failure` is an expected result, not an error. It always carries the
/// title and author so callers can draw a placeholder cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionResult {
    Success {
        url: String,
        width: u32,
        height: u32,
        resolved_at: DateTime<Utc>,
        source: CandidateSource,
        score: u8,
    },
    Failure {
        tried_urls: Vec<String>,
        title: String,
        author: String,
        reason: FailureReason,
    },
}

impl ResolutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ResolutionResult::Success { .. })
    }

    /// The winning URL, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            ResolutionResult::Success { url, .. } => Some(url),
            ResolutionResult::Failure { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("normal".parse::<Priority>().unwrap(), Priority::Normal);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_has_identifiers() {
        let mut item = CatalogItem {
            id: "1".into(),
            title: "T".into(),
            author: "A".into(),
            isbn: None,
            primary_image_url: Some("  ".into()),
            fallback_urls: vec!["https://x.example/a.jpg".into()],
        };
        assert!(!item.has_identifiers());
        item.isbn = Some("0439708184".into());
        assert!(item.has_identifiers());
    }

    #[test]
    fn test_catalog_item_accepts_camel_case_aliases() {
        let item: CatalogItem = serde_json::from_str(
            r#"{"id":"7","title":"Dune","primaryImageUrl":"https://a.example/d.jpg","fallbackUrls":["https://b.example/d.png"]}"#,
        )
        .unwrap();
        assert_eq!(item.author, "");
        assert_eq!(item.primary_image_url.as_deref(), Some("https://a.example/d.jpg"));
        assert_eq!(item.fallback_urls.len(), 1);
    }

    #[test]
    fn test_result_serializes_with_status_tag() {
        let result = ResolutionResult::Failure {
            tried_urls: vec![],
            title: "T".into(),
            author: "A".into(),
            reason: FailureReason::NoIdentifiers,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"], "no_identifiers");
    }
}
