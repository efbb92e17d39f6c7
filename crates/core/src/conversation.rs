//! Conversation-related types.

use max_model::ModelMessage;
use serde::{Deserialize, Serialize};

/// One completed question and answer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exchange {
    /// What the user asked.
    pub input: String,
    /// What the agent answered.
    pub output: String,
}

impl Exchange {
    /// Creates an exchange.
    #[inline]
    pub fn new<I: Into<String>, O: Into<String>>(input: I, output: O) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Lays out the messages that open a new turn: the instruction, prior
/// exchanges as alternating user/assistant messages, then the new input.
pub(crate) fn opening_messages(
    instruction: &str,
    history: &[Exchange],
    input: &str,
) -> Vec<ModelMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    if !instruction.trim().is_empty() {
        messages.push(ModelMessage::system(instruction.trim()));
    }
    for exchange in history {
        messages.push(ModelMessage::user(exchange.input.as_str()));
        messages.push(ModelMessage::assistant(exchange.output.as_str()));
    }
    messages.push(ModelMessage::user(input));
    messages
}
