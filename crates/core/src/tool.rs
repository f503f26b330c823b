//! Tool construction and execution.

mod executor;

use bellhop_model::{Call, Tool, ToolError, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

pub use executor::{Executor, ToolOutcome, execute_call};

/// Creates a tool whose arguments are decoded into `I`.
///
/// The argument schema is generated from `I`. Arguments that don't decode
/// fail the call with an invalid input error before `function` runs.
///
/// The future returned by `function` must be independent of any borrowed
/// state, and it should observe the cancellation token if it can run long.
pub fn typed_tool<I, F, Fut, S1, S2>(
    name: S1,
    description: S2,
    function: F,
) -> Tool
where
    I: DeserializeOwned + JsonSchema,
    F: Fn(CancellationToken, I) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ToolResult> + Send + 'static,
    S1: Into<String>,
    S2: Into<String>,
{
    Tool::new(name, description)
        .with_argument_schema(schema_for!(I).to_value())
        .with_function(move |cancel, call: Call| {
            let function = function.clone();
            async move {
                let input: I = call.decode().map_err(|err| {
                    ToolError::invalid_input().with_reason(format!("{err}"))
                })?;
                function(cancel, input).await
            }
        })
}
