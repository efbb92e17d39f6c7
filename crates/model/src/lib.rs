//! The protocol spoken between agents and model providers.
//!
//! Every provider, whether it routes to a local inference server or to a
//! hosted API, is driven through the same request and event types defined
//! here. That keeps the agent loop ignorant of where the model actually
//! runs, and lets tests swap in a scripted provider.
//!
//! Types in this crate carry no behavior of their own. They are the contract
//! implementors must follow.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
