use super::Agent;
use crate::generator::Generator;

/// [`Agent`] builder.
pub struct AgentBuilder {
    generator: Generator,
    max_depth: usize,
    parallelism: usize,
}

impl AgentBuilder {
    /// Creates a new builder with the generator used for every turn.
    #[inline]
    pub fn with_generator(generator: Generator) -> Self {
        Self {
            generator,
            max_depth: 10,
            parallelism: 1,
        }
    }

    /// Sets the maximum number of turns, 10 by default.
    #[inline]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets how many tool calls of one turn may run at once, 1 by default.
    ///
    /// `0` and `1` both mean sequential execution.
    #[inline]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent {
            generator: self.generator,
            max_depth: self.max_depth,
            parallelism: self.parallelism,
        }
    }
}
