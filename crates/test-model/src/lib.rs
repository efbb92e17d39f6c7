//! A local scripted model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use max_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    preset: PresetResponse,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();

        let delay = this.delay;
        let timer = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(timer.as_mut().poll(cx));
        this.sleep = None;

        let events = &this.preset.events;
        let idx = this.event_idx;
        this.event_idx += 1;

        if idx < events.len() {
            let event = match &events[idx] {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg.clone())
                }
                PresetEvent::ToolCall(req) => {
                    ModelResponseEvent::ToolCall(req.clone())
                }
            };
            return Poll::Ready(Ok(Some(event)));
        }

        if idx == events.len() {
            if let Some(PresetFailure::MidStream(kind)) = this.preset.failure {
                return Poll::Ready(Err(Error {
                    message: "preset stream failure",
                    kind,
                }));
            }
            let has_tool_call = events
                .iter()
                .any(|event| matches!(event, PresetEvent::ToolCall(_)));
            return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                if has_tool_call {
                    ModelFinishReason::ToolCalls
                } else {
                    ModelFinishReason::Stop
                },
            ))));
        }

        // In case this method is called after completion.
        this.event_idx = events.len() + 1;
        Poll::Ready(Ok(None))
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Responses are handed out in the order they were pushed, one per
/// `send_request` call, regardless of what the request contains. Every
/// received request is recorded so tests can inspect what the agent sent.
/// Once the script runs out, requests fail with [`ErrorKind::Other`].
///
/// Clones share the same script.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn push_response(&self, preset: PresetResponse) {
        self.script
            .lock()
            .expect("script lock poisoned")
            .responses
            .push_back(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns a copy of every request received so far.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.script
            .lock()
            .expect("script lock poisoned")
            .requests
            .clone()
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut script = self.script.lock().expect("script lock poisoned");
        script.requests.push(req.clone());
        let result = match script.responses.pop_front() {
            None => Err(Error {
                message: "script exhausted",
                kind: ErrorKind::Other,
            }),
            Some(PresetResponse {
                failure: Some(PresetFailure::OnRequest(kind)),
                ..
            }) => Err(Error {
                message: "preset request failure",
                kind,
            }),
            Some(preset) => Ok(TestModelResponse {
                preset,
                event_idx: 0,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            }),
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use max_model::{ModelMessage, ToolCallRequest};
    use serde_json::json;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> Result<(String, Option<ToolCallRequest>), Error> {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_call = None;
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            match event {
                ModelResponseEvent::Completed(_) => {}
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_call = Some(req),
            }
        }
        Ok((msg, tool_call))
    }

    #[tokio::test]
    async fn test_send_request() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Hello, ".to_owned()),
            PresetEvent::MessageDelta("world!".to_owned()),
        ]));
        provider.push_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me look.".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call:1".to_owned(),
                name: "search_codebase".to_owned(),
                arguments: json!({ "query": "main loop" }),
            }),
        ]));

        let req = ModelRequest {
            messages: vec![ModelMessage::user("Hi")],
            tools: vec![],
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, _) = collect_response(resp).await.unwrap();
        assert_eq!(msg, "Hello, world!");

        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call) = collect_response(resp).await.unwrap();
        assert_eq!(msg, "Let me look.");
        let tool_call = tool_call.unwrap();
        assert_eq!(tool_call.name, "search_codebase");
        assert_eq!(tool_call.arguments, json!({ "query": "main loop" }));

        assert_eq!(provider.requests().len(), 2);
        assert!(provider.send_request(&req).await.is_err());
    }

    #[tokio::test]
    async fn test_failures() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::failing(ErrorKind::Unreachable));
        provider.push_response(
            PresetResponse::text("partial").then_fail(ErrorKind::Timeout),
        );

        let req = ModelRequest::default();
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unreachable);

        let resp = provider.send_request(&req).await.unwrap();
        let err = collect_response(resp).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
