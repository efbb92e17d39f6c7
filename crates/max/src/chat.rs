//! The chat loop: runs the agent for each query and keeps the display in
//! step with its progress.

use std::future::pending;
use std::time::Duration;

use max_core::tool::ToolKind;
use max_core::{Agent, AgentError, AgentErrorKind, AgentEvent};
use max_model::ErrorKind;
use serde::Serialize;
use tokio::select;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::memory::ConversationMemory;

/// Placeholder shown until the agent produces something, followed by one to
/// three animated dots.
pub const THINKING: &str = "Thinking";

/// Shown when a turn ends without any text.
pub const NO_RESPONSE: &str = "_No response received._";

/// Shown when the model server can't be reached.
pub const CONNECTION_ERROR: &str = "❌ **Connection Error**\n\n\
    Could not reach Ollama. Is it running?\n\n```\nollama serve\n```";

/// Shown when the model server stops answering.
pub const TIMEOUT_ERROR: &str = "❌ **Timeout**\n\n\
    The model took too long to respond. Try again or use a smaller model.";

/// Every user-facing error message starts with this.
pub const ERROR_MARK: char = '❌';

const DOTS_INTERVAL: Duration = Duration::from_millis(500);
const REDRAW_INTERVAL: Duration = Duration::from_millis(50);

/// Author of a [`ChatHistory`] entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person at the keyboard.
    User,
    /// Max.
    Assistant,
}

/// What is on screen: the messages of the chat, in order.
///
/// While a response streams in, its entry is the last one and is rewritten
/// in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChatHistory {
    entries: Vec<(Role, String)>,
}

impl ChatHistory {
    /// Appends an entry.
    #[inline]
    pub fn push<S: Into<String>>(&mut self, role: Role, text: S) {
        self.entries.push((role, text.into()));
    }

    /// Replaces the text of the last entry.
    pub fn set_last_text<S: Into<String>>(&mut self, text: S) {
        if let Some((_, last)) = self.entries.last_mut() {
            *last = text.into();
        }
    }

    /// Returns the entries, oldest first.
    #[inline]
    pub fn entries(&self) -> &[(Role, String)] {
        &self.entries
    }

    /// Returns the last entry.
    #[inline]
    pub fn last(&self) -> Option<&(Role, String)> {
        self.entries.last()
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// State of the last history entry when a view is redrawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The last entry is a placeholder: the thinking animation or a note
    /// about a tool in use.
    Waiting,
    /// The last entry is a response that is still streaming.
    Streaming,
    /// The last entry is the final response.
    Done,
}

/// Something that displays a chat.
pub trait ChatView {
    /// Shows `history`. `phase` tells what its last entry is.
    fn redraw(&mut self, history: &ChatHistory, phase: Phase);

    /// Tells the user that the chat was cleared.
    fn cleared(&mut self);
}

/// How a submitted query ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The final text of the response, possibly an error message.
    pub response: String,
    /// Whether the exchange went into memory.
    pub saved: bool,
}

/// A chat with an agent: the visible history plus the memory of successful
/// exchanges that is replayed to the agent.
pub struct ChatSession {
    agent: Agent,
    history: ChatHistory,
    memory: ConversationMemory,
}

impl ChatSession {
    /// Creates a session that talks to `agent`.
    pub fn new(agent: Agent, memory: ConversationMemory) -> Self {
        Self {
            agent,
            history: ChatHistory::default(),
            memory,
        }
    }

    /// Returns what is on screen.
    #[inline]
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Returns the remembered exchanges.
    #[inline]
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Forgets the history and the memory.
    pub fn clear<V: ChatView>(&mut self, view: &mut V) {
        self.history.clear();
        self.memory.clear();
        view.cleared();
    }

    /// Sends `query` to the agent and shows the response as it comes in.
    ///
    /// Returns `None` without doing anything if the query is blank.
    /// Failures end up in the response as a user-facing message and are not
    /// remembered.
    pub async fn submit<V: ChatView>(
        &mut self,
        query: &str,
        view: &mut V,
    ) -> Option<TurnOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        self.history.push(Role::User, query);
        view.redraw(&self.history, Phase::Waiting);
        self.history.push(Role::Assistant, thinking_text(1));
        view.redraw(&self.history, Phase::Waiting);

        let mut dots = Some(Dots::new(DOTS_INTERVAL));
        let mut stream = self.agent.run_stream(&self.memory.exchanges(), query);
        let mut response = String::new();
        let mut last_redraw: Option<Instant> = None;
        let mut ending = None;

        loop {
            let step = select! {
                event = stream.next() => Step::Event(event),
                count = tick(&mut dots) => Step::Dots(count),
            };
            let event = match step {
                Step::Dots(count) => {
                    self.history.set_last_text(thinking_text(count));
                    view.redraw(&self.history, Phase::Waiting);
                    continue;
                }
                Step::Event(Some(event)) => event,
                Step::Event(None) => break,
            };

            match event {
                AgentEvent::MessageDelta(delta) => {
                    if delta.is_empty() {
                        continue;
                    }
                    dots = None;
                    response.push_str(&delta);
                    self.history.set_last_text(response.as_str());
                    let now = Instant::now();
                    if last_redraw
                        .is_none_or(|at| now - at >= REDRAW_INTERVAL)
                    {
                        view.redraw(&self.history, Phase::Streaming);
                        last_redraw = Some(now);
                    }
                }
                AgentEvent::ToolCall { name, kind, .. } => {
                    debug!("agent called `{name}`");
                    if !response.is_empty() {
                        continue;
                    }
                    dots = None;
                    let note = match kind {
                        ToolKind::Function => format!("🔧 Using {name}..."),
                        ToolKind::Agent => format!("→ {}", display_name(&name)),
                    };
                    self.history.set_last_text(note);
                    view.redraw(&self.history, Phase::Waiting);
                }
                AgentEvent::Finished { .. } => {
                    ending = Some(Ok(()));
                    break;
                }
                AgentEvent::Failed(err) => {
                    ending = Some(Err(err));
                    break;
                }
                AgentEvent::Started { .. } | AgentEvent::ToolResult { .. } => {}
            }
        }
        drop(dots);

        let response = match ending {
            Some(Ok(())) => response,
            Some(Err(err)) => {
                error!("chat turn failed: {err}");
                error_message(&err)
            }
            None => {
                error!("chat turn ended without a result");
                generic_error_message("The agent stopped before answering.")
            }
        };
        let response = if response.trim().is_empty() {
            NO_RESPONSE.to_owned()
        } else {
            response
        };
        self.history.set_last_text(response.as_str());
        view.redraw(&self.history, Phase::Done);

        let saved = is_rememberable(&response);
        if saved {
            self.memory.save_context(query, response.as_str());
        }
        Some(TurnOutcome { response, saved })
    }
}

/// Returns the message shown to the user for a failed turn.
pub fn error_message(err: &AgentError) -> String {
    match err.kind() {
        AgentErrorKind::Model(ErrorKind::Unreachable) => {
            CONNECTION_ERROR.to_owned()
        }
        AgentErrorKind::Model(ErrorKind::Timeout) => TIMEOUT_ERROR.to_owned(),
        _ => generic_error_message(err.message()),
    }
}

fn generic_error_message(detail: &str) -> String {
    format!("{ERROR_MARK} **Error**\n\n{detail}\n\nCheck logs for details.")
}

fn is_rememberable(response: &str) -> bool {
    !response.trim().is_empty()
        && response != NO_RESPONSE
        && !response.starts_with(ERROR_MARK)
}

fn thinking_text(dots: usize) -> String {
    format!("{THINKING}{}", ".".repeat(dots))
}

/// `analyst` becomes `Analyst`.
fn display_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

enum Step {
    Event(Option<AgentEvent>),
    Dots(usize),
}

/// The thinking animation: one, two, three dots, then one again.
struct Dots {
    timer: Interval,
    count: usize,
}

impl Dots {
    fn new(period: Duration) -> Self {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { timer, count: 1 }
    }

    async fn tick(&mut self) -> usize {
        self.timer.tick().await;
        self.count = self.count % 3 + 1;
        self.count
    }
}

async fn tick(dots: &mut Option<Dots>) -> usize {
    match dots {
        Some(dots) => dots.tick().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use max_core::{AgentBuilder, AgentTool, Exchange};
    use max_model::{ModelMessage, ToolCallRequest};
    use max_test_model::{PresetEvent, PresetResponse, TestModelProvider};
    use serde_json::json;

    use super::*;
    use crate::tools::{
        CodeSearch, SearchCodebaseTool, SearchError, Snippet,
    };

    #[derive(Default)]
    struct RecordingView {
        frames: Vec<(Phase, String)>,
        cleared: usize,
    }

    impl RecordingView {
        fn texts(&self, phase: Phase) -> Vec<&str> {
            self.frames
                .iter()
                .filter(|(p, _)| *p == phase)
                .map(|(_, text)| text.as_str())
                .collect()
        }
    }

    impl ChatView for RecordingView {
        fn redraw(&mut self, history: &ChatHistory, phase: Phase) {
            let text = history.last().map(|(_, t)| t.clone()).unwrap_or_default();
            self.frames.push((phase, text));
        }

        fn cleared(&mut self) {
            self.cleared += 1;
        }
    }

    struct NoHits;

    #[async_trait]
    impl CodeSearch for NoHits {
        async fn search(
            &self,
            _query: &str,
            _k: usize,
        ) -> Result<Vec<Snippet>, SearchError> {
            Ok(vec![])
        }
    }

    fn session(provider: &TestModelProvider) -> ChatSession {
        let agent = AgentBuilder::with_model_provider(provider.clone())
            .with_name("max")
            .with_tool(SearchCodebaseTool::new(Arc::new(NoHits)))
            .build();
        ChatSession::new(agent, ConversationMemory::default())
    }

    fn tool_call(name: &str, arguments: serde_json::Value) -> PresetEvent {
        PresetEvent::ToolCall(ToolCallRequest {
            id: "call_0".to_owned(),
            name: name.to_owned(),
            arguments,
        })
    }

    #[tokio::test]
    async fn test_success_is_saved() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Hello, ".to_owned()),
            PresetEvent::MessageDelta("I'm Max.".to_owned()),
        ]));
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        let outcome = session.submit("  Who are you? ", &mut view).await;
        assert_eq!(
            outcome,
            Some(TurnOutcome {
                response: "Hello, I'm Max.".to_owned(),
                saved: true,
            })
        );
        assert_eq!(
            session.history().entries(),
            [
                (Role::User, "Who are you?".to_owned()),
                (Role::Assistant, "Hello, I'm Max.".to_owned()),
            ]
        );
        assert_eq!(
            session.memory().exchanges(),
            [Exchange::new("Who are you?", "Hello, I'm Max.")]
        );
        assert_eq!(view.texts(Phase::Waiting)[1], "Thinking.");
        assert_eq!(view.frames.last().unwrap().0, Phase::Done);
    }

    #[tokio::test]
    async fn test_memory_is_replayed() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::text("Hi!"));
        provider.push_response(PresetResponse::text("You said hello."));
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        session.submit("Hello", &mut view).await;
        session.submit("What did I say?", &mut view).await;

        let requests = provider.requests();
        assert_eq!(
            requests[1].messages,
            [
                ModelMessage::user("Hello"),
                ModelMessage::assistant("Hi!"),
                ModelMessage::user("What did I say?"),
            ]
        );
    }

    #[tokio::test]
    async fn test_connection_error_is_not_saved() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::failing(ErrorKind::Unreachable));
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        let outcome = session.submit("Hello", &mut view).await.unwrap();
        assert_eq!(outcome.response, CONNECTION_ERROR);
        assert!(!outcome.saved);
        assert!(session.memory().is_empty());
        assert_eq!(
            session.history().last(),
            Some(&(Role::Assistant, CONNECTION_ERROR.to_owned()))
        );
    }

    #[tokio::test]
    async fn test_timeout_replaces_partial_text() {
        let provider = TestModelProvider::default();
        provider.push_response(
            PresetResponse::text("Half an ans").then_fail(ErrorKind::Timeout),
        );
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        let outcome = session.submit("Explain", &mut view).await.unwrap();
        assert_eq!(outcome.response, TIMEOUT_ERROR);
        assert!(!outcome.saved);
    }

    #[tokio::test]
    async fn test_other_error() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::failing(ErrorKind::Other));
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        let outcome = session.submit("Hello", &mut view).await.unwrap();
        assert!(outcome.response.starts_with("❌ **Error**\n\n"));
        assert!(outcome.response.ends_with("\n\nCheck logs for details."));
        assert!(!outcome.saved);
    }

    #[tokio::test]
    async fn test_empty_response() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::with_events(Vec::new()));
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        let outcome = session.submit("Hello", &mut view).await.unwrap();
        assert_eq!(outcome.response, NO_RESPONSE);
        assert!(!outcome.saved);
        assert!(session.memory().is_empty());
        assert_eq!(view.frames.last().unwrap().1, NO_RESPONSE);
    }

    #[tokio::test]
    async fn test_blank_query_is_ignored() {
        let provider = TestModelProvider::default();
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        assert_eq!(session.submit(" \n", &mut view).await, None);
        assert!(session.history().is_empty());
        assert!(view.frames.is_empty());
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_tool_notes() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::with_events([tool_call(
            "search_codebase",
            json!({ "query": "router" }),
        )]));
        provider.push_response(PresetResponse::with_events([tool_call(
            "analyst",
            json!({ "request": "Find the router" }),
        )]));
        provider.push_response(PresetResponse::text("Nothing found."));
        provider.push_response(PresetResponse::text("There is no router."));

        let analyst = AgentBuilder::with_model_provider(provider.clone())
            .with_name("analyst")
            .build();
        let agent = AgentBuilder::with_model_provider(provider.clone())
            .with_name("max")
            .with_tool(SearchCodebaseTool::new(Arc::new(NoHits)))
            .with_tool(AgentTool::new(analyst))
            .build();
        let mut session = ChatSession::new(agent, ConversationMemory::default());
        let mut view = RecordingView::default();

        let outcome = session.submit("Where is the router?", &mut view).await;
        assert_eq!(outcome.unwrap().response, "There is no router.");
        let waiting = view.texts(Phase::Waiting);
        assert!(waiting.contains(&"🔧 Using search_codebase..."));
        assert!(waiting.contains(&"→ Analyst"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_thinking_dots() {
        let mut provider = TestModelProvider::default();
        provider.set_delay(Duration::from_millis(1600));
        provider.push_response(PresetResponse::text("Done."));
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        session.submit("Think hard", &mut view).await;
        assert_eq!(
            view.texts(Phase::Waiting)[1..5],
            ["Thinking.", "Thinking..", "Thinking...", "Thinking."]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_redraws_are_throttled() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::with_events(
            (0..10)
                .map(|n| PresetEvent::MessageDelta(format!("{n} ")))
                .collect::<Vec<_>>(),
        ));
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        let outcome = session.submit("Count", &mut view).await.unwrap();
        assert_eq!(view.texts(Phase::Streaming), ["0 "]);
        assert_eq!(outcome.response, "0 1 2 3 4 5 6 7 8 9 ");
        assert_eq!(view.frames.last().unwrap().1, outcome.response);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_deltas_are_all_drawn() {
        let mut provider = TestModelProvider::default();
        provider.set_delay(Duration::from_millis(60));
        provider.push_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("a".to_owned()),
            PresetEvent::MessageDelta("b".to_owned()),
            PresetEvent::MessageDelta("c".to_owned()),
        ]));
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        session.submit("Spell", &mut view).await;
        assert_eq!(view.texts(Phase::Streaming), ["a", "ab", "abc"]);
    }

    #[tokio::test]
    async fn test_clear() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::text("Hi!"));
        let mut session = session(&provider);
        let mut view = RecordingView::default();

        session.submit("Hello", &mut view).await;
        session.clear(&mut view);
        assert!(session.history().is_empty());
        assert!(session.memory().is_empty());
        assert_eq!(view.cleared, 1);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("analyst"), "Analyst");
        assert_eq!(display_name(""), "");
    }
}
