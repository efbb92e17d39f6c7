use max_model::{ModelMessage, ModelRequest, ModelTool, ToolCallRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OllamaConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: FunctionCall,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ChunkMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// One line of a streamed `/api/chat` response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of a failed request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An installed model, as reported by `/api/tags`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ModelTag {
    /// Full tag name, e.g. `llama3.2:latest`.
    pub name: String,
    /// Size on disk, in bytes.
    #[serde(default)]
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TagList {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        content: String,
        tool_name: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(req: &ModelRequest, config: &OllamaConfig) -> ChatRequest {
    ChatRequest {
        model: config.model().to_owned(),
        messages: req.messages.iter().map(create_message).collect(),
        tools: req.tools.iter().map(create_tool).collect(),
        stream: true,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System { content } => Message::System {
            content: content.clone(),
        },
        ModelMessage::User { content } => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant {
            content,
            tool_calls,
        } => Message::Assistant {
            content: content.clone(),
            tool_calls: tool_calls.iter().map(create_tool_call).collect(),
        },
        ModelMessage::Tool(result) => Message::Tool {
            content: result.content.clone(),
            tool_name: result.name.clone(),
        },
    }
}

#[inline]
fn create_tool_call(req: &ToolCallRequest) -> ToolCall {
    ToolCall {
        id: Some(req.id.clone()),
        function: FunctionCall {
            name: req.name.clone(),
            arguments: req.arguments.clone(),
        },
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}
