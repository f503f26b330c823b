mod builder;

use std::iter;

use bellhop_model::{Call, Metadata, Prompt, Tool, ToolSelectionPolicy};
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Instrument;

use crate::error::AgentError;
use crate::generator::Generator;
use crate::tool::{Executor, ToolOutcome};
pub use builder::AgentBuilder;

/// The reserved tool the model calls to finish a tools-only run.
pub const FINALIZE_TOOL_NAME: &str = "__return_result__";

/// The outcome of a successful agent run.
#[derive(Clone, Debug)]
pub struct AgentResult<T> {
    /// The full transcript, starting with the input prompts.
    pub prompts: Vec<Prompt>,
    /// The decoded final answer.
    pub result: T,
    /// Token accounting summed over every turn.
    pub metadata: Metadata,
    /// The zero-based turn that produced the answer.
    pub depth: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Termination {
    /// The first text-only response is the answer.
    OnText,
    /// A call to the finalize tool carries the answer.
    Finalize,
}

/// An agent that alternates between prompting the model and running the
/// tools it asks for, until it gets a final answer.
///
/// The agent itself is stateless: every run starts from the prompts it is
/// given and returns the resulting transcript, so one agent can serve
/// concurrent runs.
#[derive(Clone, Debug)]
pub struct Agent {
    generator: Generator,
    max_depth: usize,
    parallelism: usize,
}

impl Agent {
    /// Returns the generator used for every turn.
    #[inline]
    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Returns the maximum number of turns.
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Runs until the model answers with text, which is decoded into `T`.
    ///
    /// The text is decoded as JSON first. If that fails it is decoded as a
    /// JSON string, so `T = String` accepts any plain text answer.
    pub async fn run<T: DeserializeOwned>(
        &self,
        prompts: Vec<Prompt>,
    ) -> Result<AgentResult<T>, AgentError> {
        self.drive(&self.generator, Termination::OnText, prompts)
            .await
    }

    /// Runs until the model calls [`FINALIZE_TOOL_NAME`], whose arguments
    /// are decoded into `T`.
    ///
    /// The finalize tool is added to the tools with the schema of `T`, and
    /// the model is required to call a tool on every turn. A text-only turn
    /// is recorded and the loop continues.
    pub async fn run_with_tools_only<T>(
        &self,
        prompts: Vec<Prompt>,
    ) -> Result<AgentResult<T>, AgentError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let finalize = Tool::new(
            FINALIZE_TOOL_NAME,
            "Call this tool with the final result once the task is done.",
        )
        .with_argument_schema(schema_for!(T).to_value());
        let tools = self
            .generator
            .request()
            .tools
            .iter()
            .filter(|t| t.name != FINALIZE_TOOL_NAME)
            .cloned()
            .chain(iter::once(finalize));
        let generator = self
            .generator
            .set_tools(tools)
            .set_tool_config(ToolSelectionPolicy::Required);
        self.drive(&generator, Termination::Finalize, prompts).await
    }

    async fn drive<T: DeserializeOwned>(
        &self,
        generator: &Generator,
        termination: Termination,
        mut prompts: Vec<Prompt>,
    ) -> Result<AgentResult<T>, AgentError> {
        let executor = Executor::new(self.parallelism);
        let mut metadata = Metadata::default();

        for depth in 0..self.max_depth {
            let span = debug_span!("agent run", depth);
            let turn = Turn {
                generator,
                executor: &executor,
                termination,
                depth,
            };
            let result = turn
                .run::<T>(&mut prompts, &mut metadata)
                .instrument(span)
                .await?;
            if let Some(result) = result {
                info!("finished at depth {depth}");
                return Ok(AgentResult {
                    prompts,
                    result,
                    metadata,
                    depth,
                });
            }
        }

        warn!("max depth {} reached", self.max_depth);
        Err(AgentError::DepthExhausted {
            max_depth: self.max_depth,
        })
    }
}

struct Turn<'a> {
    generator: &'a Generator,
    executor: &'a Executor,
    termination: Termination,
    depth: usize,
}

impl Turn<'_> {
    #[inline]
    fn is_finalize(&self, call: &Call) -> bool {
        self.termination == Termination::Finalize
            && call.name == FINALIZE_TOOL_NAME
    }

    /// Runs one turn, returning the answer if the run is over.
    async fn run<T: DeserializeOwned>(
        &self,
        prompts: &mut Vec<Prompt>,
        metadata: &mut Metadata,
    ) -> Result<Option<T>, AgentError> {
        let depth = self.depth;
        let response = self
            .generator
            .prompt(prompts)
            .await
            .map_err(|source| AgentError::Prompt { depth, source })?;
        *metadata += &response.metadata;

        if !response.is_tools() {
            let text = response.texts.into_iter().next().unwrap_or_default();
            if self.termination == Termination::Finalize {
                debug!("ignoring a text-only turn");
                if !text.is_empty() {
                    prompts.push(Prompt::assistant(text));
                }
                return Ok(None);
            }
            let result = decode_text(&text)
                .map_err(|source| AgentError::Decode { depth, source })?;
            prompts.push(Prompt::assistant(text));
            return Ok(Some(result));
        }

        let calls = response.tools;
        debug!("model requested {} tool calls", calls.len());
        for call in calls.iter().filter(|c| !self.is_finalize(c)) {
            let name = call.name.clone();
            match &call.tool {
                None => return Err(AgentError::ToolNotFound { depth, name }),
                Some(tool) if tool.function.is_none() => {
                    return Err(AgentError::NoCallback { depth, name });
                }
                Some(_) => {}
            }
        }

        let runnable = calls
            .iter()
            .filter(|c| !self.is_finalize(c))
            .cloned()
            .collect();
        let cancel = &self.generator.request().cancel;
        let mut outcomes =
            self.executor.execute(cancel, runnable).await.into_iter();

        let mut result = None;
        for call in calls {
            if self.is_finalize(&call) {
                if result.is_none() {
                    let decoded = call
                        .decode()
                        .map_err(|source| AgentError::Decode { depth, source })?;
                    result = Some(decoded);
                }
                prompts.push(Prompt::tool_call(&call));
                prompts.push(Prompt::tool_response(&call, call.argument.clone()));
                continue;
            }

            let Some(ToolOutcome { call, result: output }) = outcomes.next()
            else {
                break;
            };
            let response = output.map_err(|source| AgentError::ToolExecution {
                depth,
                name: call.name.clone(),
                source,
            })?;
            prompts.push(Prompt::tool_call(&call));
            prompts.push(Prompt::tool_response(&call, response));
        }
        Ok(result)
    }
}

fn decode_text<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(text).or_else(|err| {
        serde_json::from_value(Value::String(text.to_owned())).map_err(|_| err)
    })
}
