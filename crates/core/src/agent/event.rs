use std::fmt::{self, Display};

use max_model::{ErrorKind, ModelProviderError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::tool::ToolKind;

/// Something that happened during a turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentEvent {
    /// The named agent started working on the input.
    Started {
        /// Name of the agent.
        agent: String,
    },
    /// The model produced more text.
    MessageDelta(String),
    /// The model asked for a tool to be called.
    ToolCall {
        /// Identifier pairing the call with its result.
        id: String,
        /// Name of the tool.
        name: String,
        /// Whether the tool is a function or a delegated agent.
        kind: ToolKind,
    },
    /// A tool call returned.
    ToolResult {
        /// Identifier of the call.
        id: String,
        /// Name of the tool.
        name: String,
        /// Whether the tool reported an error to the model.
        is_error: bool,
    },
    /// The turn completed. This is the last event.
    Finished {
        /// All text the model produced during the turn.
        transcript: String,
    },
    /// The turn failed. This is the last event.
    Failed(AgentError),
}

/// What made a turn fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentErrorKind {
    /// The model provider failed.
    Model(ErrorKind),
    /// The model kept calling tools past the round limit.
    TooManyRounds,
    /// The turn was aborted before it finished.
    Cancelled,
}

/// The error type of a failed turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentError {
    kind: AgentErrorKind,
    message: String,
}

impl AgentError {
    pub(crate) fn new<S: Into<String>>(
        kind: AgentErrorKind,
        message: S,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn from_model(err: &dyn ModelProviderError) -> Self {
        Self::new(AgentErrorKind::Model(err.kind()), err.to_string())
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(AgentErrorKind::Cancelled, "the turn was cancelled")
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> AgentErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AgentError {}

/// The events of a running turn.
///
/// Dropping the stream aborts the turn.
pub struct AgentStream {
    event_rx: mpsc::UnboundedReceiver<AgentEvent>,
    task: JoinHandle<()>,
}

impl AgentStream {
    #[inline]
    pub(crate) fn new(
        event_rx: mpsc::UnboundedReceiver<AgentEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self { event_rx, task }
    }

    /// Receives the next event, or `None` once the turn is over.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe, no event is lost if it is used in a
    /// `select!` branch that doesn't complete.
    #[inline]
    pub async fn next(&mut self) -> Option<AgentEvent> {
        self.event_rx.recv().await
    }
}

impl Drop for AgentStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}
