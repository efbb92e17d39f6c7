use serde::Deserialize;
use serde_json::{Value, json};

use super::Agent;
use crate::tool::{Error as ToolError, Tool, ToolKind, ToolResult};

/// Input of [`AgentTool`].
#[derive(Debug, Deserialize)]
pub struct AgentToolInput {
    request: String,
}

/// Exposes an [`Agent`] as a tool of another agent.
///
/// The tool takes a single `request` string, runs the wrapped agent on it
/// with no prior history, and returns the agent's answer. The tool name and
/// description are the agent's.
pub struct AgentTool {
    agent: Agent,
    description: String,
    parameter_schema: Value,
}

impl AgentTool {
    /// Wraps `agent`.
    pub fn new(agent: Agent) -> Self {
        let description = if agent.description().is_empty() {
            format!("Delegates a request to the `{}` agent.", agent.name())
        } else {
            agent.description().to_owned()
        };
        let parameter_schema = json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": "The task for the agent, written as a \
                        self-contained request."
                }
            },
            "required": ["request"]
        });
        Self {
            agent,
            description,
            parameter_schema,
        }
    }
}

impl Tool for AgentTool {
    type Input = AgentToolInput;

    fn name(&self) -> &str {
        self.agent.name()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Agent
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let agent = self.agent.clone();
        async move {
            debug!("delegating to `{}`", agent.name());
            agent.run(&[], input.request).await.map_err(|err| {
                ToolError::execution_error().with_reason(format!(
                    "`{}` could not complete the request: {err}",
                    agent.name()
                ))
            })
        }
    }
}
