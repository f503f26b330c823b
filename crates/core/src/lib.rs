//! Core logic including the generator, tool execution and the agent loop.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agent;
mod error;
mod generator;
mod stream;
pub mod tool;

pub use agent::{Agent, AgentBuilder, AgentResult, FINALIZE_TOOL_NAME};
pub use error::AgentError;
pub use generator::Generator;
pub use stream::collect_stream;
