use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A note as seen by callers: a titled UTF-8 text document.
///
/// The title doubles as the storage key (plus the markdown extension), so
/// it must not contain characters that are invalid in file names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
    pub content: String,
    pub last_modified: DateTime<Utc>,
}

/// One hit of a search, built per query and never persisted.
///
/// Highlight fields are `None` when the corresponding index field did not
/// match the query, not empty strings.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub last_modified: DateTime<Utc>,
    /// Relevance score. Only populated for relevance-ordered searches of a
    /// real query; field sorts and the match-all query carry no score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// The whole title with matched terms marked up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_highlights: Option<String>,
    /// Context fragments around content matches, tags stripped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_highlights: Option<String>,
    /// Tags of the note that matched the query, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_matches: Option<Vec<String>>,
}

/// Axis to order search results on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Score,
    Title,
    LastModified,
}

/// Caller-facing sort direction: ascending or descending on the chosen
/// axis, regardless of which axis it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}
