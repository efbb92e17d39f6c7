//! Max, a local AI for your codebase.
//!
//! Max answers questions about the project it is started in, using a model
//! served by a local Ollama server. An orchestrator agent routes each
//! question to specialists: a code analyst that searches the project, and a
//! searcher that looks things up on the web.
//!
//! The crate includes the `max` CLI. The pieces it is assembled from, the
//! tools, the agent factories and the chat loop, can also be used as a
//! library.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod agents;
pub mod chat;
pub mod config;
pub mod index;
mod memory;
#[cfg(feature = "cli")]
pub mod terminal;
pub mod tools;

pub use chat::{ChatHistory, ChatSession, ChatView, Phase, Role, TurnOutcome};
pub use config::{ConfigError, Settings, SettingsBuilder};
pub use index::{IndexError, LexicalIndex};
pub use memory::{ConversationMemory, DEFAULT_MEMORY_WINDOW};
