//! Tool functions the agents call, and the search backends behind them.

mod search_codebase;
mod web_search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use search_codebase::SearchCodebaseTool;
pub use web_search::WebSearchTool;

/// Number of hits a search tool asks its backend for.
pub const SEARCH_LIMIT: usize = 5;

/// Outcome label of a [`SearchResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// The backend returned at least one hit.
    Success,
    /// The backend returned nothing.
    NoResults,
    /// No backend is configured.
    Unavailable,
    /// The backend failed, `context` carries the failure.
    Error,
}

/// The record a search tool hands back to the model, as JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Outcome of the search.
    pub status: SearchStatus,
    /// Text the model reads: the hits, or an explanation.
    pub context: String,
    /// Where each hit came from, one entry per hit.
    pub sources: Vec<String>,
    /// Number of hits.
    pub count: usize,
}

impl SearchResult {
    fn empty<S: Into<String>>(status: SearchStatus, context: S) -> Self {
        Self {
            status,
            context: context.into(),
            sources: vec![],
            count: 0,
        }
    }

    /// A result for a search that found nothing.
    #[inline]
    pub fn no_results(query: &str) -> Self {
        Self::empty(
            SearchStatus::NoResults,
            format!("Nothing matched `{query}`."),
        )
    }

    /// A result for a search with no backend behind it.
    #[inline]
    pub fn unavailable<S: Into<String>>(context: S) -> Self {
        Self::empty(SearchStatus::Unavailable, context)
    }

    /// A result for a failed search.
    #[inline]
    pub fn failed(err: &SearchError) -> Self {
        Self::empty(SearchStatus::Error, err.to_string())
    }

    /// Serializes the record into the tool output.
    pub(crate) fn to_tool_output(&self) -> String {
        // A struct of strings and integers always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Error returned by a search backend.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The project index could not be read.
    #[error("could not read the project index: {0}")]
    Index(#[from] crate::index::IndexError),
    /// The backend reported a failure.
    #[error("{0}")]
    Backend(String),
}

/// A piece of a source file returned by a [`CodeSearch`] backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snippet {
    /// Path of the file, relative to the project root.
    pub path: String,
    /// 1-based first line of the snippet.
    pub start_line: usize,
    /// 1-based last line of the snippet, inclusive.
    pub end_line: usize,
    /// The snippet text.
    pub text: String,
}

/// A hit returned by a [`WebSearch`] backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebHit {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Excerpt of the page.
    pub snippet: String,
}

/// A backend that finds code relevant to a query.
#[async_trait]
pub trait CodeSearch: Send + Sync + 'static {
    /// Returns at most `k` snippets, best first.
    async fn search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<Snippet>, SearchError>;
}

/// A backend that searches the internet.
#[async_trait]
pub trait WebSearch: Send + Sync + 'static {
    /// Returns at most `k` hits, best first.
    async fn search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<WebHit>, SearchError>;
}
