use bellhop_model::{Call, ToolError, ToolResult};
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// A finished tool call.
#[derive(Clone, Debug)]
pub struct ToolOutcome {
    /// The call as requested by the model.
    pub call: Call,
    /// What the callback returned.
    pub result: ToolResult,
}

/// Runs batches of tool calls with bounded parallelism.
///
/// Outcomes are always returned in the order of the input calls, however
/// the callbacks are scheduled.
#[derive(Clone, Copy, Debug)]
pub struct Executor {
    parallelism: usize,
}

impl Default for Executor {
    #[inline]
    fn default() -> Self {
        Self::new(1)
    }
}

impl Executor {
    /// Creates an executor running at most `parallelism` calls at once.
    ///
    /// `0` and `1` both mean sequential execution.
    #[inline]
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }

    /// Returns the maximum number of calls in flight.
    #[inline]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Executes every call and waits for all of them.
    ///
    /// A failing call doesn't stop the others.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        calls: Vec<Call>,
    ) -> Vec<ToolOutcome> {
        debug!(
            "executing {} tool calls, parallelism {}",
            calls.len(),
            self.parallelism
        );
        let outcomes = stream::iter(calls).map(|call| {
            let cancel = cancel.clone();
            async move {
                let result = execute_call(cancel, call.clone()).await;
                ToolOutcome { call, result }
            }
        });
        if self.parallelism == 1 {
            outcomes.then(|fut| fut).collect().await
        } else {
            outcomes.buffered(self.parallelism).collect().await
        }
    }
}

/// Executes a single call with the callback of its bound tool.
///
/// Unbound calls and tools without a callback fail without running
/// anything. Otherwise the callback result is returned unchanged.
pub async fn execute_call(cancel: CancellationToken, call: Call) -> ToolResult {
    let Some(tool) = &call.tool else {
        warn!("tool not found: {}", call.name);
        return Err(ToolError::not_found());
    };
    let Some(function) = tool.function.clone() else {
        warn!("tool has no callback: {}", call.name);
        return Err(ToolError::no_callback());
    };

    let span = debug_span!("tool execute", tool = %call.name, id = %call.id);
    trace!(parent: &span, "arguments: {}", call.argument);
    let result = function(cancel, call).instrument(span.clone()).await;
    if let Err(err) = &result {
        debug!(parent: &span, "tool failed: {err}");
    }
    result
}
