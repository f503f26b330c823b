use bellhop_core::{AgentBuilder, AgentError, Generator};
use bellhop_model::{Metadata, Prompt, Prompter, Tool};
use tokio_util::sync::CancellationToken;

use crate::tools::*;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    generator: Generator,
    tools: Vec<Tool>,
    max_depth: usize,
    parallelism: usize,
}

impl SessionBuilder {
    /// Creates a session builder with a prompter and the model to use.
    pub fn with_prompter<P, S>(prompter: P, model: S) -> Self
    where
        P: Prompter + 'static,
        S: Into<String>,
    {
        Self::with_generator(Generator::new(prompter).model(model))
    }

    /// Creates a session builder from a configured generator.
    #[inline]
    pub fn with_generator(generator: Generator) -> Self {
        Self {
            generator,
            tools: vec![],
            max_depth: 10,
            parallelism: 1,
        }
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.generator = self.generator.system(prompt);
        self
    }

    /// Registers a tool in addition to the built-in ones.
    #[inline]
    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Sets the maximum number of turns per message.
    #[inline]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets how many tool calls may run at once.
    #[inline]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let tools = [read_file_tool(), glob_tool()].into_iter().chain(self.tools);
        Session {
            generator: self.generator.add_tools(tools),
            max_depth: self.max_depth,
            parallelism: self.parallelism,
            transcript: vec![],
            usage: Metadata::default(),
        }
    }
}

/// The answer to one message.
#[derive(Clone, Debug)]
pub struct Reply {
    /// The final text of the assistant.
    pub text: String,
    /// Tokens spent on this message.
    pub metadata: Metadata,
    /// The number of tool rounds before the answer.
    pub depth: usize,
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The agent itself keeps no state between runs, the session does: every
/// message is answered with the full transcript of the previous ones.
pub struct Session {
    generator: Generator,
    max_depth: usize,
    parallelism: usize,
    transcript: Vec<Prompt>,
    usage: Metadata,
}

impl Session {
    /// Sends a message and waits for the answer.
    ///
    /// If the run fails, the message is not added to the transcript.
    pub async fn send_message(
        &mut self,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<Reply, AgentError> {
        let agent = AgentBuilder::with_generator(
            self.generator.with_cancellation(cancel.clone()),
        )
        .with_max_depth(self.max_depth)
        .with_parallelism(self.parallelism)
        .build();

        let mut prompts = self.transcript.clone();
        prompts.push(Prompt::user(message));
        let result = agent.run::<String>(prompts).await?;

        debug!(
            "answered after {} tool rounds, {} tokens",
            result.depth, result.metadata.total_tokens
        );
        self.transcript = result.prompts;
        self.usage += &result.metadata;
        Ok(Reply {
            text: result.result,
            metadata: result.metadata,
            depth: result.depth,
        })
    }

    /// Returns the generator used by the session.
    #[inline]
    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn transcript(&self) -> &[Prompt] {
        &self.transcript
    }

    /// Returns the tokens spent so far.
    #[inline]
    pub fn usage(&self) -> &Metadata {
        &self.usage
    }
}
