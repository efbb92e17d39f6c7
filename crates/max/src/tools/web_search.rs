use std::sync::Arc;

use max_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use super::{SEARCH_LIMIT, SearchResult, SearchStatus, WebHit, WebSearch};

#[derive(Deserialize, JsonSchema)]
pub struct WebSearchParameters {
    #[schemars(description = "The search query.")]
    query: String,
}

/// A tool for searching the internet.
///
/// Without a backend every search reports `unavailable`, so the model can
/// tell the user instead of guessing.
pub struct WebSearchTool {
    backend: Option<Arc<dyn WebSearch>>,
    parameter_schema: Value,
}

impl WebSearchTool {
    /// Creates a new web search tool.
    #[inline]
    pub fn new(backend: Option<Arc<dyn WebSearch>>) -> Self {
        WebSearchTool {
            backend,
            parameter_schema: schema_for!(WebSearchParameters).to_value(),
        }
    }
}

impl Tool for WebSearchTool {
    type Input = WebSearchParameters;

    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        r#"
Searches the internet for documentation, tutorials and other up-to-date information.
The result is a JSON object with `status`, `context`, `sources` and `count`."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WebSearchParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let backend = self.backend.clone();
        async move {
            let query = input.query.trim();
            if query.is_empty() {
                return Err(ToolError::invalid_input()
                    .with_reason("`query` must not be empty"));
            }
            let Some(backend) = backend else {
                return Ok(SearchResult::unavailable(
                    "Web search is not configured on this machine.",
                )
                .to_tool_output());
            };
            let result = match backend.search(query, SEARCH_LIMIT).await {
                Ok(hits) if hits.is_empty() => SearchResult::no_results(query),
                Ok(hits) => hits_result(&hits),
                Err(err) => {
                    warn!("web search for `{query}` failed: {err}");
                    SearchResult::failed(&err)
                }
            };
            Ok(result.to_tool_output())
        }
    }
}

fn hits_result(hits: &[WebHit]) -> SearchResult {
    let context = hits
        .iter()
        .map(|hit| format!("{}\n{}\n{}\n", hit.title, hit.url, hit.snippet))
        .collect::<Vec<_>>()
        .join("\n");
    SearchResult {
        status: SearchStatus::Success,
        context,
        sources: hits.iter().map(|hit| hit.url.clone()).collect(),
        count: hits.len(),
    }
}
