mod builder;
mod delegate;
mod event;
mod run;

use std::sync::Arc;

use tokio::sync::mpsc;

pub use builder::AgentBuilder;
pub use delegate::AgentTool;
pub use event::{AgentError, AgentErrorKind, AgentEvent, AgentStream};

use crate::conversation::Exchange;
use crate::model_client::ModelClient;
use crate::tool::Executor as ToolExecutor;

/// The most model calls a single turn may make before giving up.
pub const MAX_ROUNDS: usize = 8;

pub(crate) struct AgentInner {
    name: String,
    description: String,
    instruction: String,
    model_client: ModelClient,
    tool_executor: ToolExecutor,
}

/// An agent: a model, an instruction string and a set of tools.
///
/// Agents keep no conversation state of their own. Every turn is given the
/// prior exchanges explicitly, which lets a front end decide what gets
/// remembered, and lets the same agent serve as a stateless sub-agent.
///
/// Cloning an agent is cheap, clones share the same model and tools.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    /// Returns the name of the agent.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the description of the agent.
    #[inline]
    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// Returns the instruction given to the model.
    #[inline]
    pub fn instruction(&self) -> &str {
        &self.inner.instruction
    }

    /// Starts a turn and returns the stream of its events.
    ///
    /// The turn runs on a separate task. It ends with exactly one
    /// [`AgentEvent::Finished`] or [`AgentEvent::Failed`]. Dropping the
    /// stream aborts the turn.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn run_stream<S: Into<String>>(
        &self,
        history: &[Exchange],
        input: S,
    ) -> AgentStream {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run::run_turn(
            Arc::clone(&self.inner),
            history.to_vec(),
            input.into(),
            event_tx,
        ));
        AgentStream::new(event_rx, task)
    }

    /// Runs a turn to completion and returns the generated text.
    pub async fn run<S: Into<String>>(
        &self,
        history: &[Exchange],
        input: S,
    ) -> Result<String, AgentError> {
        let mut stream = self.run_stream(history, input);
        while let Some(event) = stream.next().await {
            match event {
                AgentEvent::Finished { transcript } => return Ok(transcript),
                AgentEvent::Failed(err) => return Err(err),
                _ => {}
            }
        }
        Err(AgentError::cancelled())
    }

    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            model_client,
            name,
            description,
            instruction,
            tools,
        } = builder;

        Self {
            inner: Arc::new(AgentInner {
                name,
                description,
                instruction,
                model_client,
                tool_executor: ToolExecutor::with_tools(tools),
            }),
        }
    }
}
