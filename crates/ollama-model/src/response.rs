use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use max_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    ToolCallRequest,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Lines;
use crate::proto::ChatChunk;

struct PartialState {
    lines: Lines,
    // Events decoded from the last line that haven't been handed out yet.
    // One line may carry a delta and several tool calls at once.
    pending: VecDeque<ModelResponseEvent>,
    tool_call_count: usize,
    done: bool,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    /// A streamed response of the `/api/chat` endpoint.
    pub struct OllamaResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OllamaResponse {
    #[inline]
    pub(crate) fn from_lines(lines: Lines) -> Self {
        let partial_state = PartialState {
            lines,
            pending: VecDeque::new(),
            tool_call_count: 0,
            done: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OllamaResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    loop {
        if let Some(event) = partial_state.pending.pop_front() {
            return Ok((Some(event), partial_state));
        }
        if partial_state.done {
            return Ok((None, partial_state));
        }

        let Some(line) = partial_state.lines.next_line().await? else {
            return Err(Error::new(
                "response ended before the model finished",
                ErrorKind::Other,
            ));
        };
        trace!("got chat chunk: {line}");

        let chunk = serde_json::from_str::<ChatChunk>(&line)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        decode_chunk(&mut partial_state, chunk)?;
    }
}

// Events of one chunk are queued in a fixed order: message delta first, then
// tool calls, then the completion.
fn decode_chunk(
    state: &mut PartialState,
    chunk: ChatChunk,
) -> Result<(), Error> {
    if let Some(error) = chunk.error {
        return Err(Error::new(error, ErrorKind::Other));
    }

    if let Some(message) = chunk.message {
        if let Some(thinking) = message.thinking.filter(|t| !t.is_empty()) {
            trace!("model is thinking: {thinking}");
        }
        if !message.content.is_empty() {
            state
                .pending
                .push_back(ModelResponseEvent::MessageDelta(message.content));
        }
        for tool_call in message.tool_calls {
            // The server doesn't always assign ids, but the agent needs one
            // to pair results with requests.
            let id = tool_call
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", state.tool_call_count));
            state.tool_call_count += 1;
            state.pending.push_back(ModelResponseEvent::ToolCall(
                ToolCallRequest {
                    id,
                    name: tool_call.function.name,
                    arguments: tool_call.function.arguments,
                },
            ));
        }
    }

    if chunk.done {
        state.done = true;
        let reason = if state.tool_call_count > 0 {
            ModelFinishReason::ToolCalls
        } else {
            debug!("model finished: {:?}", chunk.done_reason);
            ModelFinishReason::Stop
        };
        state.pending.push_back(ModelResponseEvent::Completed(reason));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use max_model::ModelProviderError;
    use serde_json::json;

    use super::*;
    use crate::io::Chunks;

    fn response_of(chunks: Vec<Bytes>) -> OllamaResponse {
        OllamaResponse::from_lines(Lines::new(Chunks::from_vec_deque(
            chunks.into(),
        )))
    }

    async fn collect(
        resp: OllamaResponse,
    ) -> Result<Vec<ModelResponseEvent>, Error> {
        let mut resp = pin!(resp);
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            events.push(event);
        }
        Ok(events)
    }

    #[tokio::test]
    async fn test_tool_call_stream() {
        let resp = response_of(vec![Bytes::from_static(include_bytes!(
            "../fixtures/chat_tool_call.ndjson"
        ))]);
        let events = collect(resp).await.unwrap();
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Let me ".to_owned()),
                ModelResponseEvent::MessageDelta("search.".to_owned()),
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_0".to_owned(),
                    name: "search_codebase".to_owned(),
                    arguments: json!({ "query": "vector store" }),
                }),
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_1".to_owned(),
                    name: "web_search".to_owned(),
                    arguments: json!({ "query": "chroma docs" }),
                }),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ]
        );
    }

    #[tokio::test]
    async fn test_text_stream_split_across_chunks() {
        let resp = response_of(vec![
            Bytes::from_static(b"{\"message\":{\"role\":\"assistant\",\"con"),
            Bytes::from_static(b"tent\":\"Hello\"},\"done\":false}\n{\"mess"),
            Bytes::from_static(
                b"age\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"done_reason\":\"stop\"}\n",
            ),
        ]);
        let events = collect(resp).await.unwrap();
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Hello".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn test_server_error_line() {
        let resp = response_of(vec![Bytes::from_static(
            b"{\"error\":\"model requires more system memory\"}\n",
        )]);
        let err = collect(resp).await.unwrap_err();
        assert_eq!(err.message(), "model requires more system memory");
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_truncated_stream() {
        let resp = response_of(vec![Bytes::from_static(
            b"{\"message\":{\"role\":\"assistant\",\"content\":\"Hi\"},\"done\":false}\n",
        )]);
        assert!(collect(resp).await.is_err());
    }
}
