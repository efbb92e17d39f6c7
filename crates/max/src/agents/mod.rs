//! Factories for the agents that make up Max.
//!
//! Max is an orchestrator that delegates to specialists, each of them an
//! agent of its own that the orchestrator calls like a tool.

use std::sync::Arc;

use max_core::{Agent, AgentBuilder, AgentTool};
use max_model::ModelProvider;

use crate::tools::{CodeSearch, SearchCodebaseTool, WebSearch, WebSearchTool};

/// Name of the orchestrator agent.
pub const ROOT_AGENT_NAME: &str = "max";

/// Creates the code analyst, which answers questions with
/// `search_codebase`.
pub fn analyst_agent<P: ModelProvider + 'static>(
    provider: P,
    code_search: Arc<dyn CodeSearch>,
) -> Agent {
    AgentBuilder::with_model_provider(provider)
        .with_name("analyst")
        .with_description(
            "Code analyst specialist. Finds and explains code in the user's \
             project: structure, dependencies and data flow.",
        )
        .with_instruction(include_str!("./prompts/analyst.md"))
        .with_tool(SearchCodebaseTool::new(code_search))
        .build()
}

/// Creates the retrieval specialist, which answers questions with
/// `web_search`.
pub fn searcher_agent<P: ModelProvider + 'static>(
    provider: P,
    web_search: Option<Arc<dyn WebSearch>>,
) -> Agent {
    AgentBuilder::with_model_provider(provider)
        .with_name("searcher")
        .with_description(
            "Information retrieval specialist. Searches the web for \
             documentation and other up-to-date information.",
        )
        .with_instruction(include_str!("./prompts/searcher.md"))
        .with_tool(WebSearchTool::new(web_search))
        .build()
}

/// Creates Max, the orchestrator that routes requests to the specialists.
pub fn root_agent<P: ModelProvider + Clone + 'static>(
    provider: P,
    code_search: Arc<dyn CodeSearch>,
    web_search: Option<Arc<dyn WebSearch>>,
) -> Agent {
    let analyst = analyst_agent(provider.clone(), code_search);
    let searcher = searcher_agent(provider.clone(), web_search);
    AgentBuilder::with_model_provider(provider)
        .with_name(ROOT_AGENT_NAME)
        .with_description("Orchestrator that routes tasks to specialist agents.")
        .with_instruction(include_str!("./prompts/root.md"))
        .with_tool(AgentTool::new(analyst))
        .with_tool(AgentTool::new(searcher))
        .build()
}

#[cfg(test)]
mod tests {
    use max_model::{ModelMessage, ToolCallRequest};
    use max_test_model::{PresetEvent, PresetResponse, TestModelProvider};
    use serde_json::json;

    use super::*;
    use crate::tools::{SearchError, Snippet};

    struct OneSnippet;

    #[async_trait::async_trait]
    impl CodeSearch for OneSnippet {
        async fn search(
            &self,
            _query: &str,
            _k: usize,
        ) -> Result<Vec<Snippet>, SearchError> {
            Ok(vec![Snippet {
                path: "src/main.rs".to_owned(),
                start_line: 1,
                end_line: 1,
                text: "fn main() {}".to_owned(),
            }])
        }
    }

    fn tool_call(name: &str, arguments: serde_json::Value) -> PresetEvent {
        PresetEvent::ToolCall(ToolCallRequest {
            id: "call_0".to_owned(),
            name: name.to_owned(),
            arguments,
        })
    }

    #[tokio::test]
    async fn test_root_routes_to_analyst() {
        // All three agents share one script, in the order they call the
        // model: root, analyst, analyst again, root again.
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::with_events([tool_call(
            "analyst",
            json!({ "request": "Where is main?" }),
        )]));
        provider.push_response(PresetResponse::with_events([tool_call(
            "search_codebase",
            json!({ "query": "main" }),
        )]));
        provider.push_response(PresetResponse::text("In src/main.rs."));
        provider.push_response(PresetResponse::text("It's in src/main.rs."));

        let root = root_agent(provider.clone(), Arc::new(OneSnippet), None);
        assert_eq!(root.name(), ROOT_AGENT_NAME);

        let answer = root.run(&[], "Where is main?").await.unwrap();
        assert_eq!(answer, "It's in src/main.rs.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 4);
        let root_tools: Vec<_> =
            requests[0].tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(root_tools, ["analyst", "searcher"]);
        let analyst_tools: Vec<_> =
            requests[1].tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(analyst_tools, ["search_codebase"]);

        let Some(ModelMessage::Tool(search)) = requests[2].messages.last()
        else {
            panic!("expected the search result");
        };
        assert!(search.content.contains("\"status\":\"success\""));
        assert!(search.content.contains("src/main.rs"));
    }

    #[test]
    fn test_analyst_agent() {
        let provider = TestModelProvider::default();
        let analyst = analyst_agent(provider, Arc::new(OneSnippet));
        assert_eq!(analyst.name(), "analyst");
        assert!(analyst.instruction().contains("search_codebase"));
    }
}
