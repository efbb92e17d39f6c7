use std::sync::Arc;

use max_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use super::{CodeSearch, SEARCH_LIMIT, SearchResult, SearchStatus, Snippet};

#[derive(Deserialize, JsonSchema)]
pub struct SearchCodebaseParameters {
    #[schemars(
        description = "What to look for, e.g. a symbol, an error message or a short description of the code."
    )]
    query: String,
}

/// A tool for finding the code relevant to a question.
pub struct SearchCodebaseTool {
    backend: Arc<dyn CodeSearch>,
    parameter_schema: Value,
}

impl SearchCodebaseTool {
    /// Creates a new codebase search tool over `backend`.
    #[inline]
    pub fn new(backend: Arc<dyn CodeSearch>) -> Self {
        SearchCodebaseTool {
            backend,
            parameter_schema: schema_for!(SearchCodebaseParameters).to_value(),
        }
    }
}

impl Tool for SearchCodebaseTool {
    type Input = SearchCodebaseParameters;

    fn name(&self) -> &str {
        "search_codebase"
    }

    fn description(&self) -> &str {
        r#"
Searches the user's codebase and returns the most relevant snippets with their file paths and line ranges.
The result is a JSON object with `status`, `context`, `sources` and `count`."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: SearchCodebaseParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let backend = Arc::clone(&self.backend);
        async move {
            let query = input.query.trim();
            if query.is_empty() {
                return Err(ToolError::invalid_input()
                    .with_reason("`query` must not be empty"));
            }
            let result = match backend.search(query, SEARCH_LIMIT).await {
                Ok(snippets) if snippets.is_empty() => {
                    SearchResult::no_results(query)
                }
                Ok(snippets) => snippets_result(&snippets),
                Err(err) => {
                    warn!("codebase search for `{query}` failed: {err}");
                    SearchResult::failed(&err)
                }
            };
            debug!("search_codebase `{query}`: {} hits", result.count);
            Ok(result.to_tool_output())
        }
    }
}

fn snippets_result(snippets: &[Snippet]) -> SearchResult {
    let mut context = String::new();
    for snippet in snippets {
        if !context.is_empty() {
            context.push('\n');
        }
        context.push_str(&format!(
            "==> {} L{}-{} <==\n{}\n",
            snippet.path, snippet.start_line, snippet.end_line, snippet.text
        ));
    }
    SearchResult {
        status: SearchStatus::Success,
        context,
        sources: snippets.iter().map(|s| s.path.clone()).collect(),
        count: snippets.len(),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::tools::SearchError;

    struct FixedSearch(Result<Vec<Snippet>, String>);

    #[async_trait]
    impl CodeSearch for FixedSearch {
        async fn search(
            &self,
            _query: &str,
            k: usize,
        ) -> Result<Vec<Snippet>, SearchError> {
            assert_eq!(k, SEARCH_LIMIT);
            self.0.clone().map_err(SearchError::Backend)
        }
    }

    async fn run(backend: FixedSearch, query: &str) -> ToolResult {
        let tool = SearchCodebaseTool::new(Arc::new(backend));
        tool.execute(SearchCodebaseParameters {
            query: query.to_owned(),
        })
        .await
    }

    fn parse(output: ToolResult) -> SearchResult {
        serde_json::from_str(&output.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_hits() {
        let backend = FixedSearch(Ok(vec![
            Snippet {
                path: "src/main.rs".to_owned(),
                start_line: 1,
                end_line: 3,
                text: "fn main() {\n    run();\n}".to_owned(),
            },
            Snippet {
                path: "src/run.rs".to_owned(),
                start_line: 10,
                end_line: 10,
                text: "pub fn run() {}".to_owned(),
            },
        ]));
        let result = parse(run(backend, "run").await);
        assert_eq!(result.status, SearchStatus::Success);
        assert_eq!(result.count, 2);
        assert_eq!(result.sources, ["src/main.rs", "src/run.rs"]);
        assert!(result.context.starts_with("==> src/main.rs L1-3 <==\n"));
        assert!(result.context.contains("==> src/run.rs L10-10 <==\npub fn run() {}"));
    }

    #[tokio::test]
    async fn test_no_hits() {
        let result = parse(run(FixedSearch(Ok(vec![])), "nothing").await);
        assert_eq!(result.status, SearchStatus::NoResults);
        assert_eq!(result.count, 0);
    }

    #[tokio::test]
    async fn test_backend_failure() {
        let backend = FixedSearch(Err("store is offline".to_owned()));
        let result = parse(run(backend, "main").await);
        assert_eq!(result.status, SearchStatus::Error);
        assert_eq!(result.context, "store is offline");
    }

    #[tokio::test]
    async fn test_empty_query() {
        let err = run(FixedSearch(Ok(vec![])), "  ").await.unwrap_err();
        assert_eq!(err.kind(), max_core::tool::ErrorKind::InvalidInput);
    }
}
