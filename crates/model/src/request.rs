use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The input messages, oldest first.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
}

/// A complete message in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ModelMessage {
    /// The system instructions.
    System {
        /// Instruction text.
        content: String,
    },
    /// A user input text.
    User {
        /// Input text.
        content: String,
    },
    /// A message produced by the model.
    Assistant {
        /// Text the model generated, possibly empty.
        content: String,
        /// Tool calls the model requested in this message.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    /// A tool call result.
    Tool(ToolCallResult),
}

impl ModelMessage {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Creates a text-only assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: vec![],
        }
    }
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The identifier of the tool call request this result answers.
    pub id: String,
    /// Name of the tool that produced the result.
    pub name: String,
    /// The result of the tool call.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// Providers expect a [JSON schema](https://json-schema.org/) object.
    pub parameters: Value,
}
