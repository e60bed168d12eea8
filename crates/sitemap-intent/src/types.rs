//! Records flowing through the intent engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal tag for a field no rule could resolve.
pub const UNKNOWN: &str = "unknown";

/// One `<url>` entry handed over by the sitemap reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub url: String,
    pub lastmod: Option<String>,
}

impl SitemapEntry {
    pub fn new(url: impl Into<String>, lastmod: Option<String>) -> Self {
        Self {
            url: url.into(),
            lastmod,
        }
    }
}

/// A classified URL: one per distinct normalized URL in a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Normalized absolute URL; the diff identity.
    pub url: String,
    /// Path component only, without query, fragment, or trailing slash.
    pub path: String,
    /// Number of non-empty path segments.
    pub depth: usize,
    /// Lowercased slug tokens from every segment.
    pub tokens: Vec<String>,
    pub action: String,
    pub object: String,
    pub scene: String,
    pub intent_category: String,
    #[serde(default)]
    pub notes: String,
    /// Plain-language reading of the action/object pair.
    #[serde(default)]
    pub description: String,
    /// Tokens with navigation and boilerplate words removed.
    #[serde(default)]
    pub filtered_tokens: Vec<String>,
    /// Alternative keywords for the resolved tags, then the filtered tokens.
    #[serde(default)]
    pub similar_keywords: Vec<String>,
    #[serde(default)]
    pub lastmod: Option<String>,
    /// Set only by the differ.
    #[serde(default)]
    pub is_new: bool,
}

impl UrlRecord {
    pub fn has_action(&self) -> bool {
        is_resolved(&self.action)
    }

    pub fn has_object(&self) -> bool {
        is_resolved(&self.object)
    }
}

/// True when `tag` is neither empty nor the `unknown` literal.
pub fn is_resolved(tag: &str) -> bool {
    !tag.is_empty() && tag != UNKNOWN
}

/// Which record field an enrichment request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Action,
    Object,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Action => f.write_str("action"),
            Field::Object => f.write_str("object"),
        }
    }
}

/// Sibling and group ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Case-insensitive lexicographic.
    Name,
    /// Descending count, ties broken by name.
    #[default]
    Count,
}

impl std::str::FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SortMode::Name),
            "count" => Ok(SortMode::Count),
            other => Err(format!("unknown sort mode '{other}' (expected name|count)")),
        }
    }
}

/// Key used to fold records into a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Path,
    IntentCategory,
    Object,
}

impl std::str::FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "path" => Ok(GroupBy::Path),
            "intent" | "intent_category" => Ok(GroupBy::IntentCategory),
            "object" => Ok(GroupBy::Object),
            other => Err(format!(
                "unknown grouping '{other}' (expected path|intent_category|object)"
            )),
        }
    }
}
