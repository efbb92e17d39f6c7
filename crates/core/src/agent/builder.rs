use max_model::ModelProvider;

use super::Agent;
use crate::model_client::ModelClient;
use crate::tool::{AnyTool, Tool, ToolObject};

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) instruction: String,
    pub(crate) tools: Vec<Box<dyn ToolObject>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            name: "agent".to_owned(),
            description: String::new(),
            instruction: String::new(),
            tools: vec![],
        }
    }

    /// Sets the name of the agent.
    ///
    /// When the agent is used as a tool, this is also the tool name, so it
    /// should be a short identifier like `analyst`.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets a one-line description of what the agent is good at.
    #[inline]
    pub fn with_description<S: Into<String>>(
        mut self,
        description: S,
    ) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the instruction sent as the system message.
    #[inline]
    pub fn with_instruction<S: Into<String>>(
        mut self,
        instruction: S,
    ) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        let tool = Box::new(AnyTool(tool));
        self.tools.push(tool);
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent::from_builder(self)
    }
}
