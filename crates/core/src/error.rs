use bellhop_model::{Error as PromptError, ToolError};
use thiserror::Error;

/// Errors that abort an agent run.
///
/// `depth` is the zero-based turn at which the run failed.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The prompter failed.
    #[error("prompt failed at depth {depth}: {source}")]
    Prompt {
        /// The failing turn.
        depth: usize,
        /// The underlying error.
        source: PromptError,
    },
    /// The model asked for a tool that is not registered.
    #[error("tool {name} at depth {depth}: not found in local setup")]
    ToolNotFound {
        /// The failing turn.
        depth: usize,
        /// The requested tool name.
        name: String,
    },
    /// The model asked for a tool that has no callback.
    #[error("tool {name} at depth {depth}: no callback function attached")]
    NoCallback {
        /// The failing turn.
        depth: usize,
        /// The requested tool name.
        name: String,
    },
    /// A tool callback failed.
    #[error("tool {name} failed at depth {depth}: {source}")]
    ToolExecution {
        /// The failing turn.
        depth: usize,
        /// The tool name.
        name: String,
        /// The error returned by the callback.
        source: ToolError,
    },
    /// The final answer could not be decoded into the requested type.
    #[error("could not decode the result at depth {depth}: {source}")]
    Decode {
        /// The failing turn.
        depth: usize,
        /// The underlying error.
        source: serde_json::Error,
    },
    /// The model still requested tools after the last allowed turn.
    #[error("max depth {max_depth} reached without a final answer")]
    DepthExhausted {
        /// The configured limit.
        max_depth: usize,
    },
}

impl AgentError {
    /// Returns the turn at which the run failed, if known.
    pub fn depth(&self) -> Option<usize> {
        match self {
            Self::Prompt { depth, .. }
            | Self::ToolNotFound { depth, .. }
            | Self::NoCallback { depth, .. }
            | Self::ToolExecution { depth, .. }
            | Self::Decode { depth, .. } => Some(*depth),
            Self::DepthExhausted { .. } => None,
        }
    }
}
