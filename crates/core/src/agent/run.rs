use std::sync::Arc;

use futures_util::future::join_all;
use max_model::{ModelMessage, ModelRequest, ToolCallResult};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::Instrument;

use super::event::{AgentError, AgentErrorKind, AgentEvent};
use super::{AgentInner, MAX_ROUNDS};
use crate::conversation::{Exchange, opening_messages};
use crate::tool::{Error as ToolError, ToolResult};

type EventSender = mpsc::UnboundedSender<AgentEvent>;

/// Aborts the tool tasks of a round when the turn is dropped while waiting
/// for them. Aborting a finished task does nothing.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

pub(crate) async fn run_turn(
    inner: Arc<AgentInner>,
    history: Vec<Exchange>,
    input: String,
    event_tx: EventSender,
) {
    let span = debug_span!("agent turn", agent = %inner.name);
    let last_event = match drive(&inner, &history, &input, &event_tx)
        .instrument(span)
        .await
    {
        Ok(transcript) => AgentEvent::Finished { transcript },
        Err(err) => {
            warn!("turn of `{}` failed: {err}", inner.name);
            AgentEvent::Failed(err)
        }
    };
    event_tx.send(last_event).ok();
}

async fn drive(
    inner: &AgentInner,
    history: &[Exchange],
    input: &str,
    event_tx: &EventSender,
) -> Result<String, AgentError> {
    event_tx
        .send(AgentEvent::Started {
            agent: inner.name.clone(),
        })
        .ok();

    let mut messages = opening_messages(&inner.instruction, history, input);
    let tools = inner.tool_executor.definitions();
    let mut transcript = String::new();

    for round in 0..MAX_ROUNDS {
        if event_tx.is_closed() {
            return Err(AgentError::cancelled());
        }
        debug!("round {round}, {} messages", messages.len());

        let request = ModelRequest {
            messages: messages.clone(),
            tools: tools.clone(),
        };
        let delta_tx = event_tx.clone();
        let resp = inner
            .model_client
            .send_request(request, move |delta| {
                delta_tx.send(AgentEvent::MessageDelta(delta)).ok();
            })
            .await
            .map_err(|err| AgentError::from_model(err.as_ref()))?;

        trace!(
            "round {round} finished with {:?}, {} tool calls",
            resp.finish_reason,
            resp.tool_calls.len()
        );
        transcript.push_str(&resp.transcript);
        if resp.tool_calls.is_empty() {
            return Ok(transcript);
        }

        messages.push(ModelMessage::Assistant {
            content: resp.transcript,
            tool_calls: resp.tool_calls.clone(),
        });
        for call in &resp.tool_calls {
            event_tx
                .send(AgentEvent::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    kind: inner.tool_executor.kind_of(&call.name),
                })
                .ok();
        }

        // Tools of one round run concurrently, results keep request order.
        let mut pending = vec![];
        inner
            .tool_executor
            .handle_requests(resp.tool_calls, |req, fut| {
                pending.push((req, tokio::spawn(fut)));
            });
        let (requests, tasks): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
        let _abort_guard = AbortOnDrop(
            tasks.iter().map(JoinHandle::abort_handle).collect(),
        );
        let results = join_all(tasks).await;

        for (req, joined) in requests.into_iter().zip(results) {
            let result: ToolResult = joined.unwrap_or_else(|err| {
                Err(ToolError::execution_error()
                    .with_reason(format!("tool task failed: {err}")))
            });
            let is_error = result.is_err();
            let content = match result {
                Ok(output) => output,
                Err(err) => format!("Error: {}", err.reason()),
            };
            event_tx
                .send(AgentEvent::ToolResult {
                    id: req.id.clone(),
                    name: req.name.clone(),
                    is_error,
                })
                .ok();
            messages.push(ModelMessage::Tool(ToolCallResult {
                id: req.id,
                name: req.name,
                content,
            }));
        }
    }

    Err(AgentError::new(
        AgentErrorKind::TooManyRounds,
        format!("the model was still calling tools after {MAX_ROUNDS} rounds"),
    ))
}
